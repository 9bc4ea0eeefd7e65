//! Render history and duration estimates.
//!
//! Keeps the last [`MAX_RECORDS`] successful renders per project name and
//! predicts durations from their mean per-frame time.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::{self, KeyValueStore, StoreResult, HISTORY_KEY};

/// Records retained per project; the oldest is evicted first.
pub const MAX_RECORDS: usize = 10;

/// One completed render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub duration_secs: u64,
    pub frame_count: u32,
    pub timestamp: DateTime<Utc>,
}

type HistoryMap = BTreeMap<String, Vec<HistoryRecord>>;

/// History of render durations keyed by project display name.
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles on the history key.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a record for `key`, evicting the oldest beyond [`MAX_RECORDS`].
    pub fn record(&self, key: &str, duration_secs: u64, frame_count: u32) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let mut history = self.load()?;

        let records = history.entry(key.to_string()).or_default();
        records.push(HistoryRecord {
            duration_secs,
            frame_count,
            timestamp: Utc::now(),
        });
        if records.len() > MAX_RECORDS {
            let excess = records.len() - MAX_RECORDS;
            records.drain(..excess);
        }

        tracing::debug!(project = key, duration_secs, frame_count, "Recorded render history");
        store::save(self.store.as_ref(), HISTORY_KEY, &history)
    }

    /// Estimate seconds to render `frame_count` frames of `key`.
    ///
    /// `None` when there is no usable history. Otherwise the arithmetic mean
    /// of each record's seconds-per-frame, times `frame_count`, rounded.
    pub fn estimate(&self, key: &str, frame_count: u32) -> Option<u64> {
        let records = self.records(key);
        let per_frame: Vec<f64> = records
            .iter()
            .filter(|r| r.frame_count > 0)
            .map(|r| r.duration_secs as f64 / r.frame_count as f64)
            .collect();

        if per_frame.is_empty() {
            return None;
        }

        let mean = per_frame.iter().sum::<f64>() / per_frame.len() as f64;
        Some((mean * frame_count as f64).round() as u64)
    }

    /// Stored records for `key`, oldest first.
    pub fn records(&self, key: &str) -> Vec<HistoryRecord> {
        match self.load() {
            Ok(mut history) => history.remove(key).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Render history unreadable, ignoring it");
                Vec::new()
            }
        }
    }

    /// Project names with at least one record.
    pub fn projects(&self) -> Vec<String> {
        self.load()
            .map(|history| history.into_keys().collect())
            .unwrap_or_default()
    }

    fn load(&self) -> StoreResult<HistoryMap> {
        store::load_or(self.store.as_ref(), HISTORY_KEY, HistoryMap::new())
    }
}
