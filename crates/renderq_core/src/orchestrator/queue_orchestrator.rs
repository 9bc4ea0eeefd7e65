//! The render queue: job list, run control and subscriptions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use super::builder::OrchestratorBuilder;
use super::errors::{OrchestratorError, OrchestratorResult};
use super::events::{QueueEvent, RunSummary};
use crate::config::{QueueSettings, RendererSettings};
use crate::history::HistoryStore;
use crate::jobs::{Job, JobId, JobQueue, JobSpec, QueueState, QUEUE_STATE_VERSION};
use crate::logging::LogConfig;
use crate::notify::NotificationDispatcher;
use crate::progress::ProgressParser;
use crate::store::{self, KeyValueStore, QUEUE_KEY};
use crate::supervisor::{PathResolver, ProcessSupervisor};

/// Run state shared between the run loop and control calls.
#[derive(Debug, Default)]
pub(super) struct RunControl {
    pub(super) running: bool,
    pub(super) stop_requested: bool,
    /// Job currently rendering.
    pub(super) active: Option<JobId>,
    /// Cancellation was requested for `active`.
    pub(super) active_cancelled: bool,
}

pub(super) struct Inner {
    pub(super) renderer: RendererSettings,
    pub(super) queue_settings: QueueSettings,
    pub(super) log_config: LogConfig,
    pub(super) job_logs_dir: Option<PathBuf>,
    pub(super) queue: Mutex<JobQueue>,
    pub(super) store: Arc<dyn KeyValueStore>,
    pub(super) history: HistoryStore,
    pub(super) supervisor: ProcessSupervisor,
    pub(super) paths: Arc<dyn PathResolver>,
    pub(super) parser: Arc<dyn ProgressParser>,
    pub(super) notifications: NotificationDispatcher,
    pub(super) subscribers: Mutex<Vec<Sender<QueueEvent>>>,
    /// Lock order: `run` before `queue` when both are held.
    pub(super) run: Mutex<RunControl>,
    pub(super) stats: Mutex<RunSummary>,
    /// Keeps queue snapshots written in the order they were taken.
    pub(super) persist_lock: Mutex<()>,
}

/// Sequential render queue.
///
/// Cloning is cheap and every clone drives the same queue, so one clone can
/// run [`start_all`](Self::start_all) while another enqueues or stops.
#[derive(Clone)]
pub struct QueueOrchestrator {
    pub(super) inner: Arc<Inner>,
}

/// Resets run control when a run ends, however it ends.
struct RunGuard<'a>(&'a Inner);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.0.run.lock() = RunControl::default();
    }
}

impl QueueOrchestrator {
    /// Start building an orchestrator persisting to `store`.
    pub fn builder(store: Arc<dyn KeyValueStore>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(store)
    }

    pub(super) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Append a pending job and return its id.
    pub fn enqueue(&self, spec: JobSpec) -> JobId {
        let estimate = self
            .inner
            .history
            .estimate(&spec.project.name, self.inner.renderer.estimate_frames);
        let job = Job::new(spec, estimate);
        let job_id = job.id;
        let name = job.name().to_string();

        self.inner.queue.lock().add(job);
        tracing::info!(job = %job_id, name = %name, estimate_secs = ?estimate, "Job queued");

        self.persist_quietly();
        self.emit(QueueEvent::JobCreated {
            job_id,
            name,
            estimate_secs: estimate,
        });
        job_id
    }

    /// Remove a job, cancelling it first if it is rendering.
    ///
    /// Returns `false` for an unknown id. A run in progress moves on to
    /// the next pending job.
    pub fn remove(&self, job_id: JobId) -> bool {
        let was_active = {
            let mut run = self.inner.run.lock();
            if run.active == Some(job_id) {
                run.active_cancelled = true;
                true
            } else {
                false
            }
        };
        if was_active {
            self.inner.supervisor.cancel_job(job_id);
        }

        let removed = self.inner.queue.lock().remove(job_id).is_some();
        if removed {
            tracing::info!(job = %job_id, "Job removed");
            self.persist_quietly();
            self.emit(QueueEvent::JobRemoved { job_id });
        }
        removed
    }

    /// Render every job pending at call time, one at a time.
    ///
    /// Blocks until the run ends; progress goes to subscribers. Jobs
    /// enqueued while running wait for the next call.
    pub fn start_all(&self) -> OrchestratorResult<RunSummary> {
        {
            let mut run = self.inner.run.lock();
            if run.running {
                return Err(OrchestratorError::AlreadyRunning);
            }
            *run = RunControl {
                running: true,
                ..RunControl::default()
            };
        }
        let _guard = RunGuard(&self.inner);

        let snapshot = self.inner.queue.lock().pending_ids();
        if snapshot.is_empty() {
            tracing::info!("No pending jobs to render");
            let summary = RunSummary::default();
            self.emit(QueueEvent::RunFinished(summary.clone()));
            return Ok(summary);
        }

        self.validate_renderer()?;
        tracing::info!(jobs = snapshot.len(), "Render run started");

        let mut summary = RunSummary::default();
        for job_id in snapshot {
            if self.inner.run.lock().stop_requested {
                tracing::info!("Render run stopped");
                break;
            }
            if let Some(finished) = self.render_job(job_id) {
                summary.record(finished.status, finished.duration_secs);
            }
        }

        tracing::info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Render run finished"
        );
        self.inner.stats.lock().merge(&summary);
        self.emit(QueueEvent::RunFinished(summary.clone()));
        Ok(summary)
    }

    /// Run [`start_all`](Self::start_all) on a dedicated thread.
    pub fn start_all_in_background(
        &self,
    ) -> OrchestratorResult<JoinHandle<OrchestratorResult<RunSummary>>> {
        let this = self.clone();
        thread::Builder::new()
            .name("renderq-run".to_string())
            .spawn(move || this.start_all())
            .map_err(OrchestratorError::Thread)
    }

    /// Cancel the rendering job and stop the run after it.
    ///
    /// Returns `false` when no run is in progress.
    pub fn stop_all(&self) -> bool {
        let active = {
            let mut run = self.inner.run.lock();
            if !run.running {
                return false;
            }
            run.stop_requested = true;
            if run.active.is_some() {
                run.active_cancelled = true;
            }
            run.active
        };

        tracing::info!(active = ?active.map(|id| id.to_string()), "Stop requested");
        if let Some(job_id) = active {
            self.inner.supervisor.cancel_job(job_id);
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.run.lock().running
    }

    /// Save the full job list under `render_queue`.
    pub fn persist(&self) -> OrchestratorResult<()> {
        let _order = self.inner.persist_lock.lock();
        let state = self.inner.queue.lock().to_state();
        store::save(self.inner.store.as_ref(), QUEUE_KEY, &state)?;
        tracing::debug!(jobs = state.jobs.len(), "Queue saved");
        Ok(())
    }

    pub(super) fn persist_quietly(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "Failed to save queue");
        }
    }

    /// Replace the in-memory queue with the persisted one.
    ///
    /// Interrupted renders come back as `pending`. Returns the job count.
    pub fn restore(&self) -> OrchestratorResult<usize> {
        if self.is_running() {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let state: QueueState = store::load(self.inner.store.as_ref(), QUEUE_KEY)?.unwrap_or_default();
        if state.version > QUEUE_STATE_VERSION {
            tracing::warn!(
                version = state.version,
                "Queue was saved by a newer version, loading what is understood"
            );
        }

        let restored = JobQueue::from_state(state, self.inner.queue_settings.prune_finished_on_restore);
        let count = restored.len();
        *self.inner.queue.lock() = restored;
        tracing::info!(jobs = count, "Queue restored");

        self.persist()?;
        Ok(count)
    }

    /// Drop completed, failed and cancelled jobs.
    pub fn clear_finished(&self) -> usize {
        let removed: Vec<JobId> = {
            let mut queue = self.inner.queue.lock();
            let ids = queue
                .jobs()
                .iter()
                .filter(|j| j.status.is_terminal())
                .map(|j| j.id)
                .collect();
            queue.clear_finished();
            ids
        };

        if !removed.is_empty() {
            self.persist_quietly();
            for job_id in &removed {
                self.emit(QueueEvent::JobRemoved { job_id: *job_id });
            }
        }
        removed.len()
    }

    /// Empty the queue and delete the persisted snapshot.
    pub fn clear(&self) -> OrchestratorResult<()> {
        if self.is_running() {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let removed: Vec<JobId> = {
            let mut queue = self.inner.queue.lock();
            let ids = queue.jobs().iter().map(|j| j.id).collect();
            queue.clear();
            ids
        };
        {
            let _order = self.inner.persist_lock.lock();
            self.inner.store.delete(QUEUE_KEY)?;
        }

        tracing::info!(jobs = removed.len(), "Queue cleared");
        for job_id in removed {
            self.emit(QueueEvent::JobRemoved { job_id });
        }
        Ok(())
    }

    /// Snapshot of all jobs in queue order.
    pub fn jobs(&self) -> Vec<Job> {
        self.inner.queue.lock().jobs().to_vec()
    }

    pub fn job(&self, job_id: JobId) -> Option<Job> {
        self.inner.queue.lock().get(job_id).cloned()
    }

    /// Look a job up by id prefix (as shown in listings).
    pub fn find_job(&self, prefix: &str) -> Option<Job> {
        self.inner.queue.lock().find_by_prefix(prefix).cloned()
    }

    /// Estimated seconds to render `frame_count` frames of `name`.
    pub fn estimate(&self, name: &str, frame_count: u32) -> Option<u64> {
        self.inner.history.estimate(name, frame_count)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.inner.notifications
    }

    /// Receive every queue event from now on.
    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        let (tx, rx) = channel::unbounded();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Totals across all runs of this orchestrator.
    pub fn stats(&self) -> RunSummary {
        self.inner.stats.lock().clone()
    }

    pub(super) fn emit(&self, event: QueueEvent) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn validate_renderer(&self) -> OrchestratorResult<()> {
        let path = self.inner.renderer.executable_path.trim();
        if path.is_empty() {
            return Err(OrchestratorError::configuration(
                "Renderer executable path is not set",
            ));
        }
        if !self.inner.paths.exists(Path::new(path)) {
            return Err(OrchestratorError::configuration(format!(
                "Renderer executable not found: {}",
                path
            )));
        }
        Ok(())
    }
}
