//! External renderer process supervision.
//!
//! [`ProcessSupervisor::run`] validates paths, spawns through an [`Executor`],
//! and streams decoded output plus a final exit status over a channel.

mod decoder;
mod executor;
mod process;

use std::path::PathBuf;

use thiserror::Error;

pub use decoder::Utf8ChunkDecoder;
pub use executor::{
    Executor, FsPathResolver, PathResolver, ProcessControl, SpawnedProcess, SystemExecutor,
};
pub use process::{ProcessSupervisor, RunHandle};

use crate::jobs::JobId;

/// Errors raised before a process is running.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Renderer executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Project file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Job {0} already has a running process")]
    AlreadyRunning(JobId),

    #[error("{source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited on its own. Death by signal is -1.
    Code(i32),
    /// Killed after a cancel request.
    Cancelled,
    /// The exit status could not be collected.
    Failed(String),
}

/// Event from a supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Exited(ExitStatus),
}
