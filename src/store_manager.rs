// src/store_manager.rs
//
// Key/value configuration store.
// `JsonFileStore` caches entries in memory and writes the whole document to disk on
// every save (atomic temp-file + rename), so each mutation is durable as soon as it returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{AcqError, Result};

// ============================================================================
// Store trait
// ============================================================================

/// Persistent key/value store for port settings, command lists and layout blobs
pub trait ConfigStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn save(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// The store data structure - a flat JSON object
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(flatten)]
    entries: HashMap<String, serde_json::Value>,
}

// ============================================================================
// JSON file store
// ============================================================================

pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries.
    /// A missing file starts empty; an unreadable or corrupt file is logged and
    /// replaced by an empty document on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match load_from_disk(&path) {
            Ok(data) => data,
            Err(e) => {
                tlog!("[StoreManager] {}, starting empty", e);
                StoreData::default()
            }
        };

        tlog!(
            "[StoreManager] Opened {} with {} entries",
            path.display(),
            data.entries.len()
        );

        Self {
            path,
            data: RwLock::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get all keys in the store
    pub fn keys(&self) -> Vec<String> {
        self.data
            .read()
            .map(|d| d.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn write_snapshot(&self, data: &StoreData) -> std::result::Result<(), String> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create store dir: {}", e))?;
            }
        }

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| format!("Failed to serialise store: {}", e))?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");

        fs::write(&temp_path, &json).map_err(|e| format!("Failed to write temp file: {}", e))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| format!("Failed to rename temp file: {}", e))
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let data = self
            .data
            .read()
            .map_err(|e| AcqError::persistence(key, format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| AcqError::persistence(key, format!("Failed to acquire write lock: {}", e)))?;

        data.entries.insert(key.to_string(), value);

        // Written under the lock so concurrent saves land in order
        self.write_snapshot(&data)
            .map_err(|e| AcqError::persistence(key, e))
    }
}

/// Load store data from disk
fn load_from_disk(path: &Path) -> std::result::Result<StoreData, String> {
    if !path.exists() {
        return Ok(StoreData::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read store file: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse store file: {}", e))
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store with no backing file, for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let data = self
            .data
            .read()
            .map_err(|e| AcqError::persistence(key, e.to_string()))?;
        Ok(data.entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| AcqError::persistence(key, e.to_string()))?;
        data.entries.insert(key.to_string(), value);
        Ok(())
    }
}
