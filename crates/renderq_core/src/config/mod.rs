//! Configuration management for renderq.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use renderq_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Renderer: {}", config.settings().renderer.executable_path);
//!
//! config.settings_mut().renderer.executable_path = "/opt/ae/aerender".to_string();
//! config.update_section(ConfigSection::Renderer).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, OutputFormat, PathSettings, QueueSettings, RendererSettings,
    Settings,
};
