//! Parser for aerender's plain-text log output.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ChunkScan, ProgressEvent, ProgressParser};

static TOTAL_FRAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Total Frames:\s*(\d+)").expect("valid regex"));

static FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Rendering frame\s*(\d+)\s*of\s*(\d+)").expect("valid regex"));

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PROGRESS:\s*(\d+)%").expect("valid regex"));

/// Recognises `Total Frames: N`, `Rendering frame X of Y` and the legacy
/// `PROGRESS: N%` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct AerenderParser;

impl AerenderParser {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressParser for AerenderParser {
    fn name(&self) -> &str {
        "aerender"
    }

    fn scan(&self, chunk: &str) -> ChunkScan {
        let total_frames = TOTAL_FRAMES_RE
            .captures(chunk)
            .and_then(|caps| caps[1].parse::<u32>().ok());

        let mut events: Vec<ProgressEvent> = FRAME_RE
            .captures_iter(chunk)
            .filter_map(|caps| {
                let current = caps[1].parse::<u32>().ok()?;
                let total = caps[2].parse::<u32>().ok()?;
                Some(ProgressEvent::Frame { current, total })
            })
            .collect();

        // The percent line only counts when no frame line matched in this chunk
        if !FRAME_RE.is_match(chunk) {
            events.extend(
                PERCENT_RE
                    .captures_iter(chunk)
                    .filter_map(|caps| caps[1].parse::<u32>().ok())
                    .map(|p| ProgressEvent::Percent(p.min(100))),
            );
        }

        ChunkScan {
            total_frames,
            events,
        }
    }
}
