//! Per-job logger for render output.
//!
//! Each render job gets its own logger that:
//! - Writes to a dedicated log file (or nowhere, for in-memory loggers)
//! - Supports compact mode with progress filtering
//! - Maintains a tail buffer of renderer output for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix};

/// Per-job logger with file output and a bounded output tail.
pub struct JobLogger {
    /// Job name for identification.
    job_name: String,
    /// Path to log file (None for in-memory loggers).
    log_path: Option<PathBuf>,
    /// File writer (buffered).
    file_writer: Mutex<Option<BufWriter<File>>>,
    /// Logging configuration.
    config: LogConfig,
    /// Tail buffer for recent output lines.
    tail_buffer: Mutex<VecDeque<String>>,
    /// Last progress value logged (for compact mode filtering).
    last_progress: Mutex<Option<u32>>,
}

impl JobLogger {
    /// Create a new job logger writing to `<log_dir>/<file_stem>.log`.
    pub fn new(
        job_name: impl Into<String>,
        file_stem: &str,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
    ) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(file_stem)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_name: job_name.into(),
            log_path: Some(log_path),
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(None),
        })
    }

    /// Create a logger that only keeps the tail buffer (for tests or when
    /// job logs are disabled).
    pub fn in_memory(job_name: impl Into<String>, config: LogConfig) -> Self {
        Self {
            job_name: job_name.into(),
            log_path: None,
            file_writer: Mutex::new(None),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(None),
        }
    }

    /// Get the job name.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.output(&self.format_message(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log progress update (filtered in compact mode).
    ///
    /// Returns true if the progress was logged, false if filtered.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            if let Some(previous) = *last {
                let current_step = (percent / step) * step;
                let last_step = (previous / step) * step;
                if current_step <= last_step && percent < 100 {
                    return false;
                }
            } else if percent % step != 0 && percent < 100 {
                return false;
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record a chunk of renderer output.
    ///
    /// Every non-empty line goes to the tail buffer; in compact mode that
    /// is the only place it goes.
    pub fn output_chunk(&self, chunk: &str, is_stderr: bool) {
        for line in chunk.lines().filter(|l| !l.trim().is_empty()) {
            {
                let mut buffer = self.tail_buffer.lock();
                if self.config.error_tail > 0 && buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                if self.config.error_tail > 0 {
                    buffer.push_back(line.to_string());
                }
            }

            if self.config.compact {
                continue;
            }

            let prefix = if is_stderr { "[stderr] " } else { "" };
            self.output(&self.format_message(&format!("{}{}", prefix, line)));
        }
    }

    /// Write the tail buffer to the log (typically after a failure).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn plain_config() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("intro.aep", "intro.aep_1a2b3c4d", dir.path(), plain_config())
            .unwrap();

        let path = logger.log_path().unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("intro.aep_1a2b3c4d.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", "job", dir.path(), plain_config()).unwrap();

        logger.command("aerender -project intro.aep");
        logger.success("Render completed");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("$ aerender -project intro.aep"));
        assert!(content.contains("[SUCCESS] Render completed"));
    }

    #[test]
    fn compact_mode_filters_progress() {
        let mut config = plain_config();
        config.compact = true;
        config.progress_step = 20;
        let logger = JobLogger::in_memory("job", config);

        assert!(logger.progress(0));
        assert!(!logger.progress(5));
        assert!(!logger.progress(15));
        assert!(logger.progress(20));
        assert!(!logger.progress(25));
        assert!(logger.progress(40));
        assert!(logger.progress(100));
    }

    #[test]
    fn tail_buffer_keeps_recent_lines() {
        let mut config = plain_config();
        config.error_tail = 3;
        let logger = JobLogger::in_memory("job", config);

        logger.output_chunk("line 1\nline 2\n", false);
        logger.output_chunk("line 3\n\nline 4", true);

        assert_eq!(logger.get_tail(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn verbose_mode_writes_output_lines() {
        let dir = tempdir().unwrap();
        let mut config = plain_config();
        config.compact = false;
        let logger = JobLogger::new("job", "job", dir.path(), config).unwrap();

        logger.output_chunk("Rendering frame 1 of 10\n", false);
        logger.output_chunk("disk full\n", true);
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("Rendering frame 1 of 10"));
        assert!(content.contains("[stderr] disk full"));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("has:colon"), "has_colon");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
