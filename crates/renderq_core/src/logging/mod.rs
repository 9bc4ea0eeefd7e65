//! Logging infrastructure for renderq.
//!
//! This module provides:
//! - Application-wide `tracing` initialization (stderr, optional rolling file)
//! - Per-job loggers with compact mode and a failure tail buffer
//!
//! # Example
//!
//! ```no_run
//! use renderq_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("intro.aep", "intro_0001", "/path/to/logs", LogConfig::default())
//!     .unwrap();
//!
//! logger.phase("Render");
//! logger.command("aerender -project intro.aep");
//! logger.progress(40);
//! logger.success("Render completed");
//! ```

mod job_logger;
mod types;

use std::path::Path;

pub use job_logger::JobLogger;
pub use types::{LogConfig, LogLevel, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Initialize tracing with stderr output plus a daily rolling file in `logs_dir`.
///
/// The returned guard must be held for the lifetime of the program; dropping
/// it flushes and stops the background file writer. Returns `None` (with
/// stderr-only logging) if the directory cannot be created.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        init_tracing(default_level);
        tracing::warn!(dir = %logs_dir.display(), error = %e, "Log directory unavailable, logging to stderr only");
        return None;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let appender = tracing_appender::rolling::daily(logs_dir, "renderq.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .try_init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Info.as_filter_str(), "info");
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
    }
}
