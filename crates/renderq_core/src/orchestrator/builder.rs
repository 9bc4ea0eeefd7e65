//! Builder for [`QueueOrchestrator`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::events::RunSummary;
use super::queue_orchestrator::{Inner, QueueOrchestrator, RunControl};
use crate::config::Settings;
use crate::history::HistoryStore;
use crate::jobs::JobQueue;
use crate::logging::LogConfig;
use crate::notify::{LogNotifier, NotificationDispatcher, Notifier};
use crate::progress::{parser_for, ProgressParser};
use crate::store::KeyValueStore;
use crate::supervisor::{Executor, FsPathResolver, PathResolver, ProcessSupervisor, SystemExecutor};

/// Wires collaborators into a [`QueueOrchestrator`].
///
/// Defaults: real processes, real filesystem, log-only notifications,
/// parser chosen by `renderer.output_format`, no per-job log files.
pub struct OrchestratorBuilder {
    store: Arc<dyn KeyValueStore>,
    settings: Settings,
    executor: Arc<dyn Executor>,
    paths: Arc<dyn PathResolver>,
    notifier: Arc<dyn Notifier>,
    parser: Option<Arc<dyn ProgressParser>>,
    job_logs_dir: Option<PathBuf>,
}

impl OrchestratorBuilder {
    pub(super) fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            settings: Settings::default(),
            executor: Arc::new(SystemExecutor),
            paths: Arc::new(FsPathResolver),
            notifier: Arc::new(LogNotifier),
            parser: None,
            job_logs_dir: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn path_resolver(mut self, paths: Arc<dyn PathResolver>) -> Self {
        self.paths = paths;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Override the parser selected by the settings.
    pub fn parser(mut self, parser: Arc<dyn ProgressParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Write per-job log files here (when `logging.job_logs` is on).
    pub fn job_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job_logs_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> QueueOrchestrator {
        let settings = self.settings;
        let parser = self
            .parser
            .unwrap_or_else(|| parser_for(settings.renderer.output_format));
        let supervisor = ProcessSupervisor::new(self.executor, Arc::clone(&self.paths))
            .with_poll_interval(Duration::from_millis(settings.renderer.poll_interval_ms));
        let job_logs_dir = self.job_logs_dir.filter(|_| settings.logging.job_logs);

        tracing::debug!(
            parser = parser.name(),
            executable = %settings.renderer.executable_path,
            "Building queue orchestrator"
        );

        QueueOrchestrator::from_inner(Inner {
            log_config: LogConfig::from_settings(&settings.logging),
            job_logs_dir,
            queue: Mutex::new(JobQueue::new()),
            history: HistoryStore::new(Arc::clone(&self.store)),
            store: self.store,
            supervisor,
            paths: self.paths,
            parser,
            notifications: NotificationDispatcher::new(self.notifier, settings.email),
            subscribers: Mutex::new(Vec::new()),
            run: Mutex::new(RunControl::default()),
            stats: Mutex::new(RunSummary::default()),
            persist_lock: Mutex::new(()),
            renderer: settings.renderer,
            queue_settings: settings.queue,
        })
    }
}
