//! Ordered render queue and its persisted form.

use serde::{Deserialize, Serialize};

use super::types::{Job, JobId, JobStatus};

/// Current format version of the persisted queue.
pub const QUEUE_STATE_VERSION: u32 = 1;

/// Persisted queue snapshot (stored under `render_queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueState {
    /// Queue format version.
    pub version: u32,
    /// Jobs in queue order.
    pub jobs: Vec<Job>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            version: QUEUE_STATE_VERSION,
            jobs: Vec::new(),
        }
    }
}

/// In-memory job list in FIFO order.
#[derive(Debug, Default, Clone)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from a persisted snapshot.
    ///
    /// Jobs caught mid-render are put back to `pending` with progress cleared.
    /// With `prune_finished`, terminal jobs are dropped.
    pub fn from_state(state: QueueState, prune_finished: bool) -> Self {
        let mut jobs = state.jobs;
        if prune_finished {
            jobs.retain(|j| !j.status.is_terminal());
        }
        for job in jobs.iter_mut().filter(|j| j.status == JobStatus::Rendering) {
            tracing::info!(job = %job.id, name = %job.name(), "Interrupted render returned to pending");
            job.reset_to_pending();
        }
        Self { jobs }
    }

    /// Snapshot for persistence.
    pub fn to_state(&self) -> QueueState {
        QueueState {
            version: QUEUE_STATE_VERSION,
            jobs: self.jobs.clone(),
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Append a job at the back of the queue.
    pub fn add(&mut self, job: Job) {
        self.jobs.push(job);
    }

    /// Remove a job by id.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.id == id)?;
        Some(self.jobs.remove(index))
    }

    /// Ids of pending jobs in execution order.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.id)
            .collect()
    }

    /// Find a job by full id or unambiguous id prefix.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Job> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .jobs
            .iter()
            .filter(|j| j.id.to_string().starts_with(&prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Drop completed, failed and cancelled jobs. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|j| !j.status.is_terminal());
        before - self.jobs.len()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}
