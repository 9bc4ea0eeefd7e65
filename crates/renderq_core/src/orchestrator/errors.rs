//! Error types for the queue orchestrator.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by queue operations.
///
/// Per-job failures (missing project, nonzero exit) are not errors here:
/// they become the job's `error` status and the run continues.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Renderer is not usable; nothing was spawned.
    #[error("Renderer configuration error: {message}")]
    Configuration { message: String },

    /// A run is already in progress.
    #[error("The render queue is already running")]
    AlreadyRunning,

    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The background run thread could not be started.
    #[error("Failed to start run thread: {0}")]
    Thread(#[source] std::io::Error),
}

impl OrchestratorError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_displays_message() {
        let err = OrchestratorError::configuration("Renderer executable not found: /opt/aerender");
        assert_eq!(
            err.to_string(),
            "Renderer configuration error: Renderer executable not found: /opt/aerender"
        );
    }

    #[test]
    fn store_error_is_transparent() {
        let err: OrchestratorError = StoreError::Corrupt {
            path: "store.json".into(),
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Store file store.json is corrupt: bad");
    }
}
