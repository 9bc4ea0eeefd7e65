//! Single-file JSON store.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{KeyValueStore, StoreError, StoreResult};

/// Key-value store persisted as one JSON object on disk.
///
/// The file is read once on open; every `set`/`delete` rewrites it
/// atomically (temp file, then rename). Memory only changes once the
/// write has succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file yields an empty store; an unreadable or non-object
    /// file is an error rather than being silently overwritten.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| StoreError::io(path.display().to_string(), e))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content) {
                    Ok(Value::Object(map)) => map,
                    Ok(other) => {
                        return Err(StoreError::Corrupt {
                            path: path.display().to_string(),
                            message: format!("expected a JSON object, found {}", kind_of(&other)),
                        })
                    }
                    Err(e) => {
                        return Err(StoreError::Corrupt {
                            path: path.display().to_string(),
                            message: e.to_string(),
                        })
                    }
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_locked(&self, values: &Map<String, Value>) -> StoreResult<()> {
        let path_str = self.path.display().to_string();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(&path_str, e))?;
            }
        }

        let json = serde_json::to_string_pretty(values).map_err(|e| StoreError::Corrupt {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        let temp_file = self.path.with_extension("json.tmp");
        fs::write(&temp_file, json).map_err(|e| StoreError::io(&path_str, e))?;
        fs::rename(&temp_file, &self.path).map_err(|e| StoreError::io(&path_str, e))?;
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        self.write_locked(&next)?;
        *values = next;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.write_locked(&next)?;
        *values = next;
        Ok(())
    }
}
