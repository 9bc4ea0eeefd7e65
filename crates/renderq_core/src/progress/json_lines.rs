//! Parser for renderers that print one JSON progress object per line.
//!
//! Recognised keys: `total_frames`, `frame` with `total`, and `percent`.
//! Non-JSON lines are ignored, so log text may be interleaved freely.

use serde::Deserialize;

use super::{ChunkScan, ProgressEvent, ProgressParser};

#[derive(Debug, Deserialize)]
struct ProgressLine {
    #[serde(default)]
    total_frames: Option<u32>,
    #[serde(default)]
    frame: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
    #[serde(default)]
    percent: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesParser;

impl JsonLinesParser {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressParser for JsonLinesParser {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn scan(&self, chunk: &str) -> ChunkScan {
        let mut scan = ChunkScan::default();
        let mut percents = Vec::new();

        for line in chunk.lines().map(str::trim).filter(|l| l.starts_with('{')) {
            let Ok(parsed) = serde_json::from_str::<ProgressLine>(line) else {
                continue;
            };

            if scan.total_frames.is_none() {
                scan.total_frames = parsed.total_frames;
            }
            if let (Some(current), Some(total)) = (parsed.frame, parsed.total) {
                scan.events.push(ProgressEvent::Frame { current, total });
            }
            if let Some(percent) = parsed.percent {
                percents.push(ProgressEvent::Percent(percent.min(100)));
            }
        }

        if scan.events.is_empty() {
            scan.events = percents;
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frames_and_totals() {
        let chunk = "{\"total_frames\": 300}\nstarting\n{\"frame\": 150, \"total\": 300}\n";
        let scan = JsonLinesParser::new().scan(chunk);
        assert_eq!(scan.total_frames, Some(300));
        assert_eq!(
            scan.events,
            vec![ProgressEvent::Frame { current: 150, total: 300 }]
        );
    }

    #[test]
    fn percent_only_when_no_frames_in_chunk() {
        let parser = JsonLinesParser::new();
        assert_eq!(
            parser.scan("{\"percent\": 42}").events,
            vec![ProgressEvent::Percent(42)]
        );
        assert_eq!(
            parser.scan("{\"percent\": 42}\n{\"frame\": 1, \"total\": 2}").events,
            vec![ProgressEvent::Frame { current: 1, total: 2 }]
        );
    }

    #[test]
    fn broken_json_is_ignored() {
        let scan = JsonLinesParser::new().scan("{\"frame\": 1, \"total\"\n{not json}");
        assert!(scan.is_empty());
    }
}
