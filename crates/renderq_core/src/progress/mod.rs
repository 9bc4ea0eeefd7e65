//! Renderer output parsing.
//!
//! A [`ProgressParser`] turns one raw output chunk into structured events.
//! Parsers hold no per-job state: the "first total wins" rule across a job's
//! lifetime is applied by the orchestrator.

mod aerender;
mod json_lines;

use std::sync::Arc;

pub use aerender::AerenderParser;
pub use json_lines::JsonLinesParser;

use crate::config::OutputFormat;

/// A progress signal extracted from renderer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `Rendering frame <current> of <total>`.
    Frame { current: u32, total: u32 },
    /// Percent-only signal from renderers that don't report frames.
    Percent(u32),
}

/// Everything recognised in one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkScan {
    /// Declared total frame count, if the chunk contains one.
    pub total_frames: Option<u32>,
    /// Progress events in the order they appear.
    pub events: Vec<ProgressEvent>,
}

impl ChunkScan {
    pub fn is_empty(&self) -> bool {
        self.total_frames.is_none() && self.events.is_empty()
    }
}

/// Parser for a renderer's streaming output.
///
/// Implementations must never fail: unrecognised text yields an empty scan.
pub trait ProgressParser: Send + Sync {
    /// Parser name (for logging).
    fn name(&self) -> &str;

    /// Scan one output chunk.
    fn scan(&self, chunk: &str) -> ChunkScan;
}

/// Parser for the configured renderer output format.
pub fn parser_for(format: OutputFormat) -> Arc<dyn ProgressParser> {
    match format {
        OutputFormat::Aerender => Arc::new(AerenderParser::new()),
        OutputFormat::JsonLines => Arc::new(JsonLinesParser::new()),
    }
}
