//! Rendering one job: spawn, merge progress, settle the outcome.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::args::{build_render_args, format_command_line};
use super::events::{ProgressUpdate, QueueEvent, TerminalUpdate};
use super::queue_orchestrator::QueueOrchestrator;
use crate::format::format_duration;
use crate::jobs::{Job, JobId, JobProgress, JobStatus, RenderOutcome};
use crate::logging::JobLogger;
use crate::progress::ProgressEvent;
use crate::supervisor::{ExitStatus, ProcessEvent, RunHandle, SupervisorError};

/// Captured output kept for failure details.
const MAX_CAPTURED_OUTPUT: usize = 64 * 1024;

/// What the run loop needs to know about a finished job.
pub(super) struct FinishedJob {
    pub(super) status: JobStatus,
    pub(super) duration_secs: Option<u64>,
}

/// Per-render state that never leaves the run loop.
struct RenderTracker {
    started: Instant,
    progress: JobProgress,
    /// First `Total Frames` value seen during this render.
    declared_total: Option<u32>,
    /// Total from the latest frame line.
    last_frame_total: Option<u32>,
    stdout: String,
    stderr: String,
}

impl RenderTracker {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            progress: JobProgress::default(),
            declared_total: None,
            last_frame_total: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn capture(&mut self, text: &str, is_stderr: bool) {
        let buf = if is_stderr {
            &mut self.stderr
        } else {
            &mut self.stdout
        };
        buf.push_str(text);
        if buf.len() > MAX_CAPTURED_OUTPUT {
            let mut cut = buf.len() - MAX_CAPTURED_OUTPUT;
            while !buf.is_char_boundary(cut) {
                cut += 1;
            }
            buf.drain(..cut);
        }
    }

    /// Frame count for history: the declared total, else the last one seen.
    fn frames(&self) -> u32 {
        self.declared_total
            .or(self.last_frame_total)
            .unwrap_or(0)
    }

    /// Failure details: stderr, or stdout when stderr is empty.
    fn details(&self) -> Option<String> {
        [&self.stderr, &self.stdout]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

impl QueueOrchestrator {
    /// Render one job from the run snapshot.
    ///
    /// `None` when the job was removed, is no longer pending, or the run
    /// was stopped before it began.
    pub(super) fn render_job(&self, job_id: JobId) -> Option<FinishedJob> {
        let job = {
            let mut run = self.inner.run.lock();
            if run.stop_requested {
                return None;
            }
            let mut queue = self.inner.queue.lock();
            let job = queue.get_mut(job_id)?;
            if let Err(e) = job.begin(Utc::now()) {
                tracing::debug!(error = %e, "Skipping job");
                return None;
            }
            run.active = Some(job_id);
            run.active_cancelled = false;
            job.clone()
        };

        tracing::info!(job = %job_id, name = %job.name(), "Render started");
        self.persist_quietly();
        self.emit(QueueEvent::JobStarted { job_id });

        let logger = self.job_logger(&job);
        logger.phase(&format!("Render {}", job.name()));
        let outcome = self.execute(&job, &logger);
        Some(self.settle(job, outcome, &logger))
    }

    fn job_logger(&self, job: &Job) -> JobLogger {
        let config = self.inner.log_config.clone();
        let Some(dir) = &self.inner.job_logs_dir else {
            return JobLogger::in_memory(job.name(), config);
        };

        let stem = format!("{}_{}", job.name(), job.id.short());
        JobLogger::new(job.name(), &stem, dir, config.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, dir = %dir.display(), "Failed to create job log");
            JobLogger::in_memory(job.name(), config)
        })
    }

    fn cancel_requested(&self) -> bool {
        let run = self.inner.run.lock();
        run.active_cancelled || run.stop_requested
    }

    /// Run the renderer and block until it exits.
    fn execute(&self, job: &Job, logger: &JobLogger) -> RenderOutcome {
        let program = &self.inner.renderer.executable_path;
        let args = build_render_args(job);
        logger.command(&format_command_line(program, &args));

        let handle = match self.inner.supervisor.run(
            job.id,
            &PathBuf::from(program),
            &args,
            &job.project.path,
        ) {
            Ok(handle) => handle,
            Err(_) if self.cancel_requested() => return RenderOutcome::Cancelled,
            Err(SupervisorError::InputMissing(_)) => {
                return RenderOutcome::start_failure("Project file not found")
            }
            Err(e) => return RenderOutcome::start_failure(e.to_string()),
        };

        // A stop or remove may have landed before the process was registered
        if self.cancel_requested() {
            handle.cancel();
        }

        let mut tracker = RenderTracker::new();
        let status = self.pump(job.id, &handle, &mut tracker, logger);
        let duration_secs = tracker.elapsed().as_secs_f64().round() as u64;

        match status {
            _ if handle.is_cancelled() => RenderOutcome::Cancelled,
            ExitStatus::Cancelled => RenderOutcome::Cancelled,
            ExitStatus::Code(0) => RenderOutcome::Completed {
                duration_secs,
                frames: tracker.frames(),
            },
            ExitStatus::Code(code) => RenderOutcome::exit_failure(code, tracker.details()),
            ExitStatus::Failed(message) => RenderOutcome::Failed {
                exit_code: None,
                message,
                details: tracker.details(),
            },
        }
    }

    /// Consume process events until exit.
    fn pump(
        &self,
        job_id: JobId,
        handle: &RunHandle,
        tracker: &mut RenderTracker,
        logger: &JobLogger,
    ) -> ExitStatus {
        loop {
            let (text, is_error) = match handle.events().recv() {
                Ok(ProcessEvent::Exited(status)) => return status,
                Ok(ProcessEvent::Stdout(text)) => (text, false),
                Ok(ProcessEvent::Stderr(text)) => (text, true),
                Err(_) => {
                    return ExitStatus::Failed(
                        "Renderer event stream closed without an exit status".to_string(),
                    )
                }
            };

            // Nothing in flight is applied once a cancel was requested
            if handle.is_cancelled() || self.cancel_requested() {
                continue;
            }

            tracker.capture(&text, is_error);
            logger.output_chunk(&text, is_error);
            if !is_error {
                self.apply_progress(job_id, &text, tracker, logger);
            }
            self.emit(QueueEvent::Output {
                job_id,
                text,
                is_error,
            });
        }
    }

    fn apply_progress(&self, job_id: JobId, text: &str, tracker: &mut RenderTracker, logger: &JobLogger) {
        let scan = self.inner.parser.scan(text);
        if scan.is_empty() {
            return;
        }

        if tracker.declared_total.is_none() {
            if let Some(total) = scan.total_frames {
                tracker.declared_total = Some(total);
                logger.info(&format!("Total frames: {}", total));
            }
        }

        let elapsed = tracker.elapsed();
        for event in &scan.events {
            if let ProgressEvent::Frame { total, .. } = *event {
                tracker.last_frame_total = Some(total);
            }
            tracker.progress.apply(event, elapsed);
        }

        if scan.events.is_empty() {
            return;
        }

        let progress = tracker.progress.clone();
        if let Some(job) = self.inner.queue.lock().get_mut(job_id) {
            job.progress = progress.clone();
        }
        logger.progress(progress.percent);
        self.emit(QueueEvent::Progress(ProgressUpdate {
            job_id,
            percent: progress.percent,
            current_frame: progress.current_frame,
            total_frames: progress.total_frames,
            eta_secs: progress.eta_secs,
        }));
    }

    /// Apply the outcome, then record, persist, publish and notify.
    fn settle(&self, job: Job, outcome: RenderOutcome, logger: &JobLogger) -> FinishedJob {
        let now = Utc::now();
        let mut finished = job;
        {
            let mut run = self.inner.run.lock();
            run.active = None;
            run.active_cancelled = false;

            let finish = |job: &mut Job| {
                if let Err(e) = job.finish(&outcome, now) {
                    tracing::warn!(error = %e, "Unexpected job state at render end");
                }
            };

            let mut queue = self.inner.queue.lock();
            match queue.get_mut(finished.id) {
                Some(queued) => {
                    finish(queued);
                    finished = queued.clone();
                }
                // Removed while rendering; settle the local copy
                None => finish(&mut finished),
            }
        }

        match &outcome {
            RenderOutcome::Completed {
                duration_secs,
                frames,
            } => {
                logger.success(&format!(
                    "Render completed in {} ({} frames)",
                    format_duration(*duration_secs),
                    frames
                ));
                tracing::info!(job = %finished.id, duration_secs, frames, "Render completed");
                if *frames > 0 {
                    if let Err(e) = self
                        .inner
                        .history
                        .record(finished.name(), *duration_secs, *frames)
                    {
                        tracing::warn!(error = %e, "Failed to record render history");
                    }
                }
            }
            RenderOutcome::Failed {
                message, exit_code, ..
            } => {
                logger.error(message);
                logger.show_tail("renderer output");
                tracing::warn!(job = %finished.id, exit_code = ?exit_code, error = %message, "Render failed");
            }
            RenderOutcome::Cancelled => {
                logger.warn("Render cancelled");
                tracing::info!(job = %finished.id, "Render cancelled");
            }
        }
        logger.close();

        self.persist_quietly();
        self.emit(QueueEvent::JobFinished(TerminalUpdate {
            job_id: finished.id,
            status: finished.status,
            duration_secs: finished.duration_secs,
            frames: finished.frames,
            error: finished.error.clone(),
        }));
        self.inner.notifications.dispatch(&finished, &outcome);

        FinishedJob {
            status: outcome.status(),
            duration_secs: match outcome {
                RenderOutcome::Completed { duration_secs, .. } => Some(duration_secs),
                _ => None,
            },
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use crate::logging::LogConfig;
    use crate::store::MemoryStore;
    use crate::supervisor::{FsPathResolver, ProcessSupervisor, SystemExecutor};

    fn render_frame_ten(queue: &QueueOrchestrator) -> (ExitStatus, RenderTracker) {
        let input = NamedTempFile::new().unwrap();
        let supervisor =
            ProcessSupervisor::new(Arc::new(SystemExecutor), Arc::new(FsPathResolver));
        let job_id = JobId::new();
        let args = vec![
            "-c".to_string(),
            "echo 'Rendering frame 10 of 100'".to_string(),
        ];
        let handle = supervisor
            .run(job_id, Path::new("/bin/sh"), &args, input.path())
            .unwrap();

        let logger = JobLogger::in_memory("test", LogConfig::default());
        let mut tracker = RenderTracker::new();
        let status = queue.pump(job_id, &handle, &mut tracker, &logger);
        (status, tracker)
    }

    fn queue() -> QueueOrchestrator {
        QueueOrchestrator::builder(Arc::new(MemoryStore::new())).build()
    }

    #[test]
    fn output_applies_progress() {
        let (status, tracker) = render_frame_ten(&queue());
        assert_eq!(status, ExitStatus::Code(0));
        assert_eq!(tracker.progress.current_frame, 10);
        assert_eq!(tracker.frames(), 100);
    }

    #[test]
    fn output_after_cancel_request_is_dropped() {
        let queue = queue();
        // Requested, but not yet routed to the process
        queue.inner.run.lock().active_cancelled = true;

        let (_, tracker) = render_frame_ten(&queue);
        assert_eq!(tracker.progress, JobProgress::default());
        assert!(tracker.stdout.is_empty());
        assert_eq!(tracker.frames(), 0);
    }
}
