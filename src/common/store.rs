//! Durable key-value slots for small JSON documents
//!
//! The watchdog snapshot and the execution-time thresholds each live under a
//! fixed key. Stores are intentionally tiny: whole-document load and save.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::{CoreError, Result};

/// Key of the watchdog snapshot slot
pub const WATCHDOG_STATE_KEY: &str = "trading-watchdog-state";
/// Key of the execution-time thresholds slot
pub const EXECUTION_THRESHOLDS_KEY: &str = "execution-time-thresholds";

/// Whole-document JSON storage keyed by name
pub trait SnapshotStore: Send + Sync {
    /// Read the document stored under `key`, `None` if the slot is empty
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the document stored under `key`
    fn save(&self, key: &str, value: &Value) -> Result<()>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn SnapshotStore>;

/// Load and deserialize a typed document
pub fn load_typed<T: DeserializeOwned>(store: &dyn SnapshotStore, key: &str) -> Result<Option<T>> {
    match store.load(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and save a typed document
pub fn save_typed<T: Serialize>(store: &dyn SnapshotStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.save(key, &value)
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CoreError::Storage(format!("invalid store key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), bytes = raw.len(), "Loaded store slot");
        Ok(Some(serde_json::from_str(&raw)?))
    }

    #[instrument(skip(self, value))]
    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Saved store slot");
        Ok(())
    }
}

/// In-memory store, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slots: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything has been saved under `key`
    pub fn contains(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.contains_key(key)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.to_string(), value.clone());
        Ok(())
    }
}
