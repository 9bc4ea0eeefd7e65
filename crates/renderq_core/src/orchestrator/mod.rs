//! Render queue orchestration.
//!
//! [`QueueOrchestrator`] owns the job list and runs pending jobs one at a
//! time through the [`ProcessSupervisor`](crate::supervisor::ProcessSupervisor):
//!
//! 1. Snapshot the pending jobs
//! 2. For each, spawn the renderer and stream its output through the parser
//! 3. Record history, persist and notify when it ends
//!
//! Subscribers receive [`QueueEvent`]s over channels.

mod args;
mod builder;
mod errors;
mod events;
mod queue_orchestrator;
mod render;

pub use args::{build_render_args, format_command_line};
pub use builder::OrchestratorBuilder;
pub use errors::{OrchestratorError, OrchestratorResult};
pub use events::{ProgressUpdate, QueueEvent, RunSummary, TerminalUpdate};
pub use queue_orchestrator::QueueOrchestrator;
