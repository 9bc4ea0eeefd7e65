//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::notify::EmailSettings;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// External renderer settings.
    #[serde(default)]
    pub renderer: RendererSettings,

    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Queue behaviour.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Email notification settings.
    #[serde(default)]
    pub email: EmailSettings,
}

/// Output dialect the renderer writes to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// aerender's plain-text log lines.
    #[default]
    Aerender,
    /// One JSON progress object per line.
    JsonLines,
}

/// External renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Path to the renderer executable.
    #[serde(default = "default_executable_path")]
    pub executable_path: String,

    /// Format of the renderer's progress output.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Nominal frame count used for estimates at enqueue time.
    #[serde(default = "default_estimate_frames")]
    pub estimate_frames: u32,

    /// How often the supervisor polls the child for exit, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_executable_path() -> String {
    if cfg!(windows) {
        r"C:\Program Files\Adobe\Adobe After Effects 2025\Support Files\aerender.exe".to_string()
    } else {
        "/Applications/Adobe After Effects 2025/aerender".to_string()
    }
}

fn default_estimate_frames() -> u32 {
    300
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            executable_path: default_executable_path(),
            output_format: OutputFormat::default(),
            estimate_frames: default_estimate_frames(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Path configuration for the state store and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// JSON file backing the key-value store (queue snapshot, history).
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_store_file() -> String {
    ".config/store.json".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Application log level (overridden by `RUST_LOG`).
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact job logs (filter progress, keep raw output in the tail only).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of output lines kept for the failure tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Write one log file per render job.
    #[serde(default = "default_true")]
    pub job_logs: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            job_logs: true,
        }
    }
}

/// Queue behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Drop completed, failed and cancelled jobs when restoring the queue.
    #[serde(default)]
    pub prune_finished_on_restore: bool,
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Renderer,
    Paths,
    Logging,
    Queue,
    Email,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Renderer,
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Queue,
        ConfigSection::Email,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Renderer => "renderer",
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Queue => "queue",
            ConfigSection::Email => "email",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Renderer => "# External renderer",
            ConfigSection::Paths => "# State store and log locations",
            ConfigSection::Logging => "# Logging configuration",
            ConfigSection::Queue => "# Queue behaviour",
            ConfigSection::Email => "# Email notifications",
        }
    }
}
