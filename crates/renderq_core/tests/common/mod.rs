//! Test doubles for driving the queue without real renderer processes.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use renderq_core::config::Settings;
use renderq_core::notify::{Notifier, NotifyResult};
use renderq_core::orchestrator::{QueueEvent, QueueOrchestrator};
use renderq_core::store::{KeyValueStore, MemoryStore};
use renderq_core::supervisor::{Executor, PathResolver, ProcessControl, SpawnedProcess};

pub const RENDERER: &str = "/opt/adobe/aerender";
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// What the next spawn does.
pub enum Behavior {
    /// Emit the chunks, then exit with the code.
    Scripted {
        stdout: Vec<String>,
        stderr: Vec<String>,
        exit_code: i32,
    },
    /// Hand a [`FakeProcess`] to the test, which drives it.
    Interactive,
    /// Spawn fails with this message.
    SpawnError(String),
}

impl Behavior {
    pub fn success(stdout: &[&str]) -> Self {
        Self::Scripted {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    pub fn failure(stderr: &[&str], exit_code: i32) -> Self {
        Self::Scripted {
            stdout: Vec::new(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            exit_code,
        }
    }
}

/// `Read` over a byte-chunk channel; EOF once every sender is gone.
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(bytes) => self.pending.extend(bytes),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

struct FakeControl {
    exit: Arc<Mutex<Option<i32>>>,
    killed: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    reported: bool,
}

impl ProcessControl for FakeControl {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        let code = *self.exit.lock();
        if code.is_some() && !self.reported {
            self.reported = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(code)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.exit.lock().get_or_insert(-9);
        Ok(())
    }
}

/// Test-side handle to an interactive fake process.
pub struct FakeProcess {
    pub args: Vec<String>,
    stdout: Sender<Vec<u8>>,
    stderr: Sender<Vec<u8>>,
    exit: Arc<Mutex<Option<i32>>>,
    killed: Arc<AtomicBool>,
}

impl FakeProcess {
    pub fn stdout(&self, text: &str) {
        let _ = self.stdout.send(text.as_bytes().to_vec());
    }

    pub fn stderr(&self, text: &str) {
        let _ = self.stderr.send(text.as_bytes().to_vec());
    }

    /// Exit with `code`, closing both streams.
    pub fn exit(self, code: i32) {
        *self.exit.lock() = Some(code);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn wait_killed(&self) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            if self.is_killed() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

/// Executor that plays back [`Behavior`]s in order.
pub struct FakeExecutor {
    behaviors: Mutex<VecDeque<Behavior>>,
    calls: Mutex<Vec<Vec<String>>>,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
    spawned_tx: Sender<FakeProcess>,
    spawned_rx: Receiver<FakeProcess>,
}

impl FakeExecutor {
    pub fn new(behaviors: Vec<Behavior>) -> Self {
        let (spawned_tx, spawned_rx) = channel::unbounded();
        Self {
            behaviors: Mutex::new(behaviors.into()),
            calls: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
            spawned_tx,
            spawned_rx,
        }
    }

    /// Argument lists of every spawn, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Most processes alive at once.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Wait for the next interactive spawn.
    pub fn next_process(&self) -> FakeProcess {
        self.spawned_rx
            .recv_timeout(TIMEOUT)
            .expect("interactive process spawned")
    }
}

impl Executor for FakeExecutor {
    fn spawn(&self, _program: &Path, args: &[String]) -> io::Result<SpawnedProcess> {
        self.calls.lock().push(args.to_vec());
        let behavior = self
            .behaviors
            .lock()
            .pop_front()
            .unwrap_or_else(|| Behavior::success(&[]));

        if let Behavior::SpawnError(message) = &behavior {
            return Err(io::Error::other(message.clone()));
        }

        let (out_tx, out_rx) = channel::unbounded();
        let (err_tx, err_rx) = channel::unbounded();
        let exit = Arc::new(Mutex::new(None));
        let killed = Arc::new(AtomicBool::new(false));

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        match behavior {
            Behavior::Scripted {
                stdout,
                stderr,
                exit_code,
            } => {
                for chunk in stdout {
                    let _ = out_tx.send(chunk.into_bytes());
                }
                for chunk in stderr {
                    let _ = err_tx.send(chunk.into_bytes());
                }
                *exit.lock() = Some(exit_code);
            }
            Behavior::Interactive => {
                let _ = self.spawned_tx.send(FakeProcess {
                    args: args.to_vec(),
                    stdout: out_tx,
                    stderr: err_tx,
                    exit: Arc::clone(&exit),
                    killed: Arc::clone(&killed),
                });
            }
            Behavior::SpawnError(_) => unreachable!(),
        }

        Ok(SpawnedProcess {
            stdout: Box::new(ChannelReader {
                rx: out_rx,
                pending: VecDeque::new(),
            }),
            stderr: Box::new(ChannelReader {
                rx: err_rx,
                pending: VecDeque::new(),
            }),
            control: Box::new(FakeControl {
                exit,
                killed,
                live: Arc::clone(&self.live),
                reported: false,
            }),
        })
    }
}

/// Path resolver backed by an explicit set of existing paths.
#[derive(Default)]
pub struct FakePaths {
    existing: Mutex<HashSet<PathBuf>>,
}

impl FakePaths {
    pub fn with(paths: &[&str]) -> Self {
        Self {
            existing: Mutex::new(paths.iter().map(PathBuf::from).collect()),
        }
    }

    pub fn add(&self, path: &str) {
        self.existing.lock().insert(PathBuf::from(path));
    }

    pub fn remove(&self, path: &str) {
        self.existing.lock().remove(Path::new(path));
    }
}

impl PathResolver for FakePaths {
    fn exists(&self, path: &Path) -> bool {
        self.existing.lock().contains(path)
    }
}

/// Notifier that remembers every local notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|(title, _)| title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_local(&self, title: &str, body: &str) {
        self.notices.lock().push((title.to_string(), body.to_string()));
    }

    fn notify_remote(&self, _to: &str, _subject: &str, _body: &str) -> NotifyResult<()> {
        Ok(())
    }
}

/// An orchestrator wired to fakes.
pub struct Harness {
    pub queue: QueueOrchestrator,
    pub executor: Arc<FakeExecutor>,
    pub paths: Arc<FakePaths>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<dyn KeyValueStore>,
}

impl Harness {
    pub fn new(behaviors: Vec<Behavior>) -> Self {
        Self::with_store(behaviors, Arc::new(MemoryStore::new()), Settings::default())
    }

    pub fn with_store(
        behaviors: Vec<Behavior>,
        store: Arc<dyn KeyValueStore>,
        mut settings: Settings,
    ) -> Self {
        settings.renderer.executable_path = RENDERER.to_string();
        settings.renderer.poll_interval_ms = 1;

        let executor = Arc::new(FakeExecutor::new(behaviors));
        let paths = Arc::new(FakePaths::with(&[RENDERER]));
        let notifier = Arc::new(RecordingNotifier::default());

        let queue = QueueOrchestrator::builder(Arc::clone(&store))
            .settings(settings)
            .executor(executor.clone())
            .path_resolver(paths.clone())
            .notifier(notifier.clone())
            .build();

        Self {
            queue,
            executor,
            paths,
            notifier,
            store,
        }
    }

    /// Queue a job for a project that exists.
    pub fn enqueue(&self, project: &str) -> renderq_core::jobs::JobId {
        self.paths.add(project);
        self.queue
            .enqueue(renderq_core::jobs::JobSpec::new(project))
    }
}

/// Wait for the first event matching `pred`, skipping others.
pub fn wait_for<F>(events: &Receiver<QueueEvent>, mut pred: F) -> QueueEvent
where
    F: FnMut(&QueueEvent) -> bool,
{
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => panic!("timed out waiting for queue event"),
            Err(RecvTimeoutError::Disconnected) => panic!("queue event channel closed"),
        }
    }
}

/// Every event received so far.
pub fn drain(events: &Receiver<QueueEvent>) -> Vec<QueueEvent> {
    events.try_iter().collect()
}
