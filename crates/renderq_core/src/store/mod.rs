//! Key-value persistence used for the queue snapshot and render history.
//!
//! The orchestrator only needs `get`/`set`/`delete` by key with
//! last-write-wins semantics; typed access goes through [`load`] and [`save`].

mod json_file;
mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Key holding the persisted queue snapshot.
pub const QUEUE_KEY: &str = "render_queue";

/// Key holding per-project render history.
pub const HISTORY_KEY: &str = "render_stats";

/// Errors from a key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode value for '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value capability.
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value for a key, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// Set a key, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Load and decode a typed value.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> StoreResult<Option<T>> {
    match store.get(key) {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Load a typed value, falling back to `default` when the key is missing.
pub fn load_or<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    default: T,
) -> StoreResult<T> {
    Ok(load(store, key)?.unwrap_or(default))
}

/// Encode and store a typed value.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> StoreResult<()> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value)
}
