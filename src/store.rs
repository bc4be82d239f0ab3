//! Durable key-value persistence for detector state
//!
//! The algorithm only needs get-state-by-key / set-state-by-key with
//! string-encoded fields, so the store boundary is a narrow trait. The
//! file-backed implementation keeps the whole map in memory and flushes it
//! atomically; each `set` replaces an entity's entire field map in one
//! operation so no partially updated state is ever observable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reading or writing persisted state
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Narrow key-value contract consumed by the batch runner
///
/// Keys are entity storage keys; values are the string-keyed field maps
/// produced by the state codec. Retention and expiry of stale entities is
/// a store concern, not part of this contract.
pub trait StateStore {
    /// Fetch the persisted field map for an entity, or `None` if absent
    fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError>;

    /// Persist an entity's full field map in one logical write
    fn set(&mut self, key: &str, fields: HashMap<String, String>) -> Result<(), StoreError>;
}

/// In-memory store for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities with persisted state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, fields: HashMap<String, String>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), fields);
        Ok(())
    }
}

/// JSON-file-backed store for resuming state across process restarts
///
/// Loads the whole file at open, buffers writes in memory, and persists via
/// [`JsonFileStore::flush`], which writes a temporary file and renames it
/// over the target so a crash mid-write leaves the previous state intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: HashMap<String, HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open an existing state file, or start empty if the file is absent
    ///
    /// # Errors
    /// IO failures other than not-found, and files that are not a JSON map
    /// of field maps.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Persist all buffered entries atomically
    pub fn flush(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Number of entities with persisted state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, fields: HashMap<String, String>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), fields);
        Ok(())
    }
}
