//! Render jobs and the ordered queue.
//!
//! This module provides:
//! - `Job`: one render request with status, progress and result
//! - `JobQueue`: FIFO job list with persisted snapshot conversion
//! - `JobProgress`: progress merge rules for parsed renderer output

mod queue;
mod types;

pub use queue::{JobQueue, QueueState, QUEUE_STATE_VERSION};
pub use types::{
    Job, JobId, JobProgress, JobSpec, JobStatus, ProjectRef, RenderOptions, RenderOutcome,
    TransitionError, ALL_COMPOSITIONS,
};
