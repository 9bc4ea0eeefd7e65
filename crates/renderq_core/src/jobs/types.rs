//! Render job types and status transitions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::progress::ProgressEvent;

/// Composition sentinel meaning "render every queued composition".
pub const ALL_COMPOSITIONS: &str = "All Comps";

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, used in log file names and listings.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue.
    #[default]
    Pending,
    /// The renderer is running for this job.
    Rendering,
    /// Finished with exit code 0.
    Completed,
    /// Failed to start or exited with a nonzero code.
    Error,
    /// Stopped by the user.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Job {job_id}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Project file plus its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub path: PathBuf,
    /// Display name; also the history key.
    pub name: String,
}

impl ProjectRef {
    /// Reference a project, naming it after its file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self { path, name }
    }

    pub fn with_name(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Renderer options for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Composition name; `None`, empty or [`ALL_COMPOSITIONS`] renders the render queue as saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Render settings template name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_settings: Option<String>,
    /// Output module template name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_module: Option<String>,
}

impl RenderOptions {
    /// Composition to pass to the renderer, if it names a single one.
    pub fn single_composition(&self) -> Option<&str> {
        self.composition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_COMPOSITIONS)
    }
}

/// What a caller submits to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub project: ProjectRef,
    pub options: RenderOptions,
}

impl JobSpec {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: ProjectRef::from_path(project),
            options: RenderOptions::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.project.name = name.into();
        self
    }

    pub fn with_composition(mut self, composition: impl Into<String>) -> Self {
        self.options.composition = Some(composition.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.options.output = Some(output.into());
        self
    }

    pub fn with_render_settings(mut self, template: impl Into<String>) -> Self {
        self.options.render_settings = Some(template.into());
        self
    }

    pub fn with_output_module(mut self, template: impl Into<String>) -> Self {
        self.options.output_module = Some(template.into());
        self
    }
}

/// Live progress of the active job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobProgress {
    pub current_frame: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    pub percent: u32,
    /// Seconds remaining; unknown until the first frame has rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
}

impl JobProgress {
    /// Merge one parsed event. `elapsed` is the time since the job started.
    pub fn apply(&mut self, event: &ProgressEvent, elapsed: Duration) {
        match *event {
            ProgressEvent::Frame { current, total } => {
                self.current_frame = current;
                self.total_frames = Some(total);
                self.percent = if total == 0 {
                    0
                } else {
                    (u64::from(current) * 100 / u64::from(total)) as u32
                };
                self.eta_secs = (current > 0).then(|| {
                    let remaining = u64::from(total.saturating_sub(current)) as f64;
                    (remaining * elapsed.as_secs_f64() / f64::from(current)).round() as u64
                });
            }
            // Legacy output carries no frame numbers
            ProgressEvent::Percent(percent) => {
                self.current_frame = 0;
                self.total_frames = None;
                self.percent = percent.min(100);
                self.eta_secs = None;
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// How a render attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed {
        duration_secs: u64,
        frames: u32,
    },
    Failed {
        /// Renderer exit code; `None` when it never started.
        exit_code: Option<i32>,
        message: String,
        details: Option<String>,
    },
    Cancelled,
}

impl RenderOutcome {
    /// Status a job takes on with this outcome.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Error,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }

    /// Failure for a renderer that exited with `code`.
    pub fn exit_failure(code: i32, details: Option<String>) -> Self {
        Self::Failed {
            exit_code: Some(code),
            message: format!("Render failed with code {}", code),
            details,
        }
    }

    /// Failure before the renderer produced an exit code.
    pub fn start_failure(message: impl Into<String>) -> Self {
        Self::Failed {
            exit_code: None,
            message: message.into(),
            details: None,
        }
    }
}

/// A job in the render queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project: ProjectRef,
    #[serde(default)]
    pub options: RenderOptions,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: JobProgress,
    /// Predicted seconds, from render history at enqueue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_secs: Option<u64>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl Job {
    /// Create a pending job from a [`JobSpec`].
    pub fn new(spec: JobSpec, estimate_secs: Option<u64>) -> Self {
        Self {
            id: JobId::new(),
            project: spec.project,
            options: spec.options,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            estimate_secs,
            enqueued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration_secs: None,
            frames: None,
            error: None,
            error_details: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// `pending` → `rendering`.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != JobStatus::Pending {
            return Err(self.transition_error(JobStatus::Rendering));
        }
        self.status = JobStatus::Rendering;
        self.progress.reset();
        self.started_at = Some(now);
        self.ended_at = None;
        Ok(())
    }

    /// `rendering` → a terminal status.
    ///
    /// A start failure may also finish a job that never left `pending`.
    pub fn finish(&mut self, outcome: &RenderOutcome, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let target = outcome.status();
        let allowed = match self.status {
            JobStatus::Rendering => true,
            JobStatus::Pending => target == JobStatus::Error,
            _ => false,
        };
        if !allowed {
            return Err(self.transition_error(target));
        }

        self.status = target;
        self.ended_at = Some(now);
        match outcome {
            RenderOutcome::Completed {
                duration_secs,
                frames,
            } => {
                self.duration_secs = Some(*duration_secs);
                self.frames = Some(*frames);
                self.progress.percent = 100;
                self.progress.eta_secs = None;
            }
            RenderOutcome::Failed {
                message, details, ..
            } => {
                self.error = Some(message.clone());
                self.error_details = details.clone();
                self.progress.eta_secs = None;
            }
            RenderOutcome::Cancelled => {
                self.progress.reset();
            }
        }
        Ok(())
    }

    /// Put an interrupted job back in line with progress cleared.
    pub fn reset_to_pending(&mut self) {
        self.status = JobStatus::Pending;
        self.progress.reset();
        self.started_at = None;
        self.ended_at = None;
    }

    fn transition_error(&self, to: JobStatus) -> TransitionError {
        TransitionError {
            job_id: self.id,
            from: self.status,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobSpec::new("/projects/intro.aep"), None)
    }

    #[test]
    fn display_name_defaults_to_file_name() {
        let spec = JobSpec::new("/projects/intro.aep");
        assert_eq!(spec.project.name, "intro.aep");
        assert_eq!(spec.with_name("Intro").project.name, "Intro");
    }

    #[test]
    fn single_composition_skips_sentinel_and_blank() {
        let mut options = RenderOptions::default();
        assert_eq!(options.single_composition(), None);
        options.composition = Some(ALL_COMPOSITIONS.to_string());
        assert_eq!(options.single_composition(), None);
        options.composition = Some("  ".to_string());
        assert_eq!(options.single_composition(), None);
        options.composition = Some("Main".to_string());
        assert_eq!(options.single_composition(), Some("Main"));
    }

    #[test]
    fn frame_event_sets_percent_and_eta() {
        let mut progress = JobProgress::default();
        progress.apply(
            &ProgressEvent::Frame { current: 150, total: 300 },
            Duration::from_secs(60),
        );
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.eta_secs, Some(60));
        assert_eq!(progress.total_frames, Some(300));
    }

    #[test]
    fn eta_unknown_before_first_frame() {
        let mut progress = JobProgress::default();
        progress.apply(
            &ProgressEvent::Frame { current: 0, total: 300 },
            Duration::from_secs(5),
        );
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.eta_secs, None);
    }

    #[test]
    fn percent_event_replaces_frame_progress() {
        let mut progress = JobProgress::default();
        progress.apply(
            &ProgressEvent::Frame { current: 10, total: 100 },
            Duration::from_secs(10),
        );
        progress.apply(&ProgressEvent::Percent(42), Duration::from_secs(12));
        assert_eq!(progress.percent, 42);
        assert_eq!(progress.eta_secs, None);
        assert_eq!(progress.current_frame, 0);
        assert_eq!(progress.total_frames, None);
    }

    #[test]
    fn percent_floors_and_handles_zero_total() {
        let mut progress = JobProgress::default();
        progress.apply(&ProgressEvent::Frame { current: 2, total: 3 }, Duration::from_secs(1));
        assert_eq!(progress.percent, 66);
        progress.apply(&ProgressEvent::Frame { current: 0, total: 0 }, Duration::from_secs(1));
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn only_pending_can_begin() {
        let mut job = job();
        job.begin(Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Rendering);

        let err = job.begin(Utc::now()).unwrap_err();
        assert_eq!(err.from, JobStatus::Rendering);
        assert_eq!(err.to, JobStatus::Rendering);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = job();
        job.begin(Utc::now()).unwrap();
        job.finish(
            &RenderOutcome::Completed {
                duration_secs: 12,
                frames: 300,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.duration_secs, Some(12));

        assert!(job.begin(Utc::now()).is_err());
        assert!(job.finish(&RenderOutcome::Cancelled, Utc::now()).is_err());
    }

    #[test]
    fn pending_job_may_only_fail() {
        let mut job = job();
        assert!(job
            .finish(&RenderOutcome::Cancelled, Utc::now())
            .is_err());
        job.finish(&RenderOutcome::start_failure("Project file not found"), Utc::now())
            .unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("Project file not found"));
    }

    #[test]
    fn exit_failure_message() {
        let outcome = RenderOutcome::exit_failure(3, Some("boom".into()));
        assert_eq!(
            outcome,
            RenderOutcome::Failed {
                exit_code: Some(3),
                message: "Render failed with code 3".into(),
                details: Some("boom".into()),
            }
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Rendering).unwrap();
        assert_eq!(json, "\"rendering\"");
    }

    #[test]
    fn short_id_is_eight_chars() {
        assert_eq!(JobId::new().short().len(), 8);
    }
}
