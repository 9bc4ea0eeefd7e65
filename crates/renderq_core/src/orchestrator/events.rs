//! Events published to queue subscribers.

use serde::Serialize;

use crate::jobs::{JobId, JobStatus};

/// Live progress of the active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub percent: u32,
    pub current_frame: u32,
    pub total_frames: Option<u32>,
    pub eta_secs: Option<u64>,
}

/// A job reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalUpdate {
    pub job_id: JobId,
    pub status: JobStatus,
    pub duration_secs: Option<u64>,
    pub frames: Option<u32>,
    pub error: Option<String>,
}

/// Counts for one or more runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
    /// Wall-clock seconds of completed renders.
    pub total_secs: u64,
}

impl RunSummary {
    /// Percentage of processed jobs that completed, rounded.
    pub fn success_rate(&self) -> u32 {
        if self.processed == 0 {
            return 0;
        }
        (f64::from(self.completed) * 100.0 / f64::from(self.processed)).round() as u32
    }

    pub(crate) fn record(&mut self, status: JobStatus, duration_secs: Option<u64>) {
        self.processed += 1;
        match status {
            JobStatus::Completed => {
                self.completed += 1;
                self.total_secs += duration_secs.unwrap_or(0);
            }
            JobStatus::Error => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Pending | JobStatus::Rendering => {}
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.processed += other.processed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
        self.total_secs += other.total_secs;
    }
}

/// Queue lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    JobCreated {
        job_id: JobId,
        name: String,
        estimate_secs: Option<u64>,
    },
    JobStarted {
        job_id: JobId,
    },
    Progress(ProgressUpdate),
    /// Raw renderer output, forwarded verbatim.
    Output {
        job_id: JobId,
        text: String,
        is_error: bool,
    },
    JobFinished(TerminalUpdate),
    JobRemoved {
        job_id: JobId,
    },
    RunFinished(RunSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_rounds() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.success_rate(), 0);

        summary.record(JobStatus::Completed, Some(10));
        summary.record(JobStatus::Completed, Some(5));
        summary.record(JobStatus::Error, None);
        assert_eq!(summary.success_rate(), 67);
        assert_eq!(summary.total_secs, 15);
    }

    #[test]
    fn merge_accumulates() {
        let mut total = RunSummary::default();
        let mut run = RunSummary::default();
        run.record(JobStatus::Cancelled, None);
        total.merge(&run);
        total.merge(&run);
        assert_eq!(total.processed, 2);
        assert_eq!(total.cancelled, 2);
    }
}
