//! renderq core - backend logic for the render queue.
//!
//! This crate contains all queue, process and persistence logic with zero
//! UI dependencies. It can be driven by the bundled CLI or any other front end.

pub mod config;
pub mod format;
pub mod history;
pub mod jobs;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod progress;
pub mod store;
pub mod supervisor;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
