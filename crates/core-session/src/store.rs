//! Typed key/value stores with explicit lifetimes.
//!
//! * [`DurableStore`] survives process restarts (file-backed in production).
//! * [`ProcessScopedStore`] lives exactly as long as the running process. It is never written
//!   to disk, so a full restart always starts from an empty store, while in-process
//!   navigations keep seeing the same contents.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Storage that outlives the process.
///
/// `put` and `remove` may be buffered; [`DurableStore::sync`] makes them durable.
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    /// Write out buffered changes. A no-op for stores that write through.
    fn sync(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<T: DurableStore + ?Sized> DurableStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
    fn sync(&mut self) -> Result<(), StoreError> {
        (**self).sync()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DurableFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// JSON map persisted at `<dir>/session.json`. `put` and `remove` only update the in-memory
/// map; [`DurableStore::sync`] rewrites the file when something changed (last write wins, no
/// versioning). Writes go to a sibling temp file then rename. Dropping the store syncs.
#[derive(Debug)]
pub struct FileDurableStore {
    path: PathBuf,
    cache: DurableFile,
    dirty: bool,
}

impl FileDurableStore {
    pub const FILE_NAME: &'static str = "session.json";

    /// Open (or lazily create) the store under `dir`. A missing or corrupt file yields an
    /// empty store; corruption is logged and overwritten on the next write.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(Self::FILE_NAME);
        let cache = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(target: "session", path = %path.display(), error = %e, "durable_store_corrupt_ignored");
                DurableFile::default()
            }),
            Err(_) => DurableFile::default(),
        };
        debug!(target: "session", path = %path.display(), keys = cache.entries.len(), "durable_store_open");
        Self {
            path,
            cache,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_file(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let encoded = serde_json::to_vec_pretty(&self.cache)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl DurableStore for FileDurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.cache.entries.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.dirty = true;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.cache.entries.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_file()?;
        self.dirty = false;
        debug!(target: "session", path = %self.path.display(), keys = self.cache.entries.len(), "durable_store_synced");
        Ok(())
    }
}

impl Drop for FileDurableStore {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(target: "session", path = %self.path.display(), error = %e, "durable_store_sync_on_drop_failed");
        }
    }
}

/// In-memory durable store for tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Storage scoped to the running process. Infallible by construction.
#[derive(Debug, Default)]
pub struct ProcessScopedStore {
    entries: HashMap<String, String>,
}

impl ProcessScopedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
