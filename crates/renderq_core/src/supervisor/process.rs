//! Process supervision: spawn, stream, cancel, reap.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use super::decoder::Utf8ChunkDecoder;
use super::executor::{Executor, PathResolver, ProcessControl};
use super::{ExitStatus, ProcessEvent, SupervisorError, SupervisorResult};
use crate::jobs::JobId;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// One live process.
struct ProcessSlot {
    control: Mutex<Box<dyn ProcessControl>>,
    cancelled: AtomicBool,
}

impl ProcessSlot {
    /// Returns `true` the first time only.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.control.lock().kill() {
            tracing::warn!(error = %e, "Failed to kill renderer process");
        }
        true
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type LiveTable = Arc<Mutex<HashMap<JobId, Arc<ProcessSlot>>>>;

/// Launches renderer processes and routes cancellation to them by job id.
pub struct ProcessSupervisor {
    executor: Arc<dyn Executor>,
    paths: Arc<dyn PathResolver>,
    poll_interval: Duration,
    live: LiveTable,
}

impl ProcessSupervisor {
    pub fn new(executor: Arc<dyn Executor>, paths: Arc<dyn PathResolver>) -> Self {
        Self {
            executor,
            paths,
            poll_interval: Duration::from_millis(50),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// How often the exit status is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Start `executable` for `job_id`.
    ///
    /// Output arrives on the handle's event channel as decoded chunks,
    /// followed by exactly one [`ProcessEvent::Exited`].
    pub fn run(
        &self,
        job_id: JobId,
        executable: &Path,
        args: &[String],
        input: &Path,
    ) -> SupervisorResult<RunHandle> {
        if !self.paths.exists(executable) {
            return Err(SupervisorError::ExecutableNotFound(executable.to_path_buf()));
        }
        if !self.paths.exists(input) {
            return Err(SupervisorError::InputMissing(input.to_path_buf()));
        }

        // Check-and-insert under one lock so a job id never gets two processes
        let mut live = self.live.lock();
        if live.contains_key(&job_id) {
            return Err(SupervisorError::AlreadyRunning(job_id));
        }

        let spawned = self
            .executor
            .spawn(executable, args)
            .map_err(|source| SupervisorError::Spawn {
                program: executable.to_path_buf(),
                source,
            })?;

        tracing::info!(
            job = %job_id,
            pid = ?spawned.control.id(),
            program = %executable.display(),
            "Renderer started"
        );

        let slot = Arc::new(ProcessSlot {
            control: Mutex::new(spawned.control),
            cancelled: AtomicBool::new(false),
        });
        live.insert(job_id, Arc::clone(&slot));
        drop(live);

        let (tx, rx) = channel::unbounded();
        let readers = vec![
            spawn_reader(spawned.stdout, tx.clone(), false),
            spawn_reader(spawned.stderr, tx.clone(), true),
        ];
        spawn_waiter(
            job_id,
            Arc::clone(&slot),
            readers,
            Arc::clone(&self.live),
            self.poll_interval,
            tx,
        );

        Ok(RunHandle {
            job_id,
            slot,
            events: rx,
        })
    }

    /// Cancel the live process for `job_id`. `false` if none is running.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let slot = self.live.lock().get(&job_id).cloned();
        match slot {
            Some(slot) => {
                slot.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether `job_id` has a process that hasn't been reaped yet.
    pub fn is_running(&self, job_id: JobId) -> bool {
        self.live.lock().contains_key(&job_id)
    }

    /// Number of processes not yet reaped.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

/// Caller's view of one supervised process.
pub struct RunHandle {
    job_id: JobId,
    slot: Arc<ProcessSlot>,
    events: Receiver<ProcessEvent>,
}

impl RunHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Event stream: output chunks, then one `Exited`.
    pub fn events(&self) -> &Receiver<ProcessEvent> {
        &self.events
    }

    /// Kill the process. Safe to call more than once.
    pub fn cancel(&self) {
        if self.slot.cancel() {
            tracing::info!(job = %self.job_id, "Renderer cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.is_cancelled()
    }
}

fn spawn_reader(
    mut stream: Box<dyn Read + Send>,
    tx: Sender<ProcessEvent>,
    is_stderr: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let wrap = |text: String| {
            if is_stderr {
                ProcessEvent::Stderr(text)
            } else {
                ProcessEvent::Stdout(text)
            }
        };
        let mut decoder = Utf8ChunkDecoder::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(text) = decoder.push(&buf[..n]) {
                        if tx.send(wrap(text)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(error = %e, is_stderr, "Output stream closed with error");
                    break;
                }
            }
        }

        if let Some(text) = decoder.finish() {
            let _ = tx.send(wrap(text));
        }
    })
}

fn spawn_waiter(
    job_id: JobId,
    slot: Arc<ProcessSlot>,
    readers: Vec<JoinHandle<()>>,
    live: LiveTable,
    poll_interval: Duration,
    tx: Sender<ProcessEvent>,
) {
    thread::spawn(move || {
        let status = loop {
            let polled = slot.control.lock().try_wait();
            match polled {
                Ok(Some(code)) => {
                    break if slot.is_cancelled() {
                        ExitStatus::Cancelled
                    } else {
                        ExitStatus::Code(code)
                    };
                }
                Ok(None) => thread::sleep(poll_interval),
                Err(e) => {
                    let _ = slot.control.lock().kill();
                    break if slot.is_cancelled() {
                        ExitStatus::Cancelled
                    } else {
                        ExitStatus::Failed(e.to_string())
                    };
                }
            }
        };

        // Normal exits deliver all output before the exit event. A killed
        // process may leave pipes open in grandchildren, so don't wait there.
        if !matches!(status, ExitStatus::Cancelled) {
            for reader in readers {
                let _ = reader.join();
            }
        }

        live.lock().remove(&job_id);
        tracing::debug!(job = %job_id, ?status, "Renderer reaped");
        let _ = tx.send(ProcessEvent::Exited(status));
    });
}
