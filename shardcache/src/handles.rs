//! In-process table of open cache file handles.
//!
//! The handle table is the unique owner of every open `FileStore`;
//! operations receive shared `Arc` clones and never outlive an eviction
//! unsafely. All table mutation is serialized by the inner mutex, which is
//! held only for map access, never across file I/O on an already-open
//! store.

use crate::error::Result;
use crate::store::{FileStore, StoreOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Mapping from handle key (`table:tenant:freshness`) to an open store.
pub struct HandleTable {
    entries: Mutex<HashMap<String, Arc<FileStore>>>,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the open store for `key`, opening and inserting it if
    /// absent.
    ///
    /// The map lock is held across `open_or_create` so a concurrent
    /// lookup of the same key cannot race a second open of the same file.
    pub fn get_or_open(
        &self,
        key: &str,
        path: &Path,
        options: &StoreOptions,
    ) -> Result<Arc<FileStore>> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(store) = entries.get(key) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(FileStore::open_or_create(path, options)?);
        entries.insert(key.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Close and remove one entry. No-op if absent.
    pub fn evict(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            debug!(key, "handle evicted");
        }
    }

    /// Close and remove every entry whose key starts with `prefix`.
    ///
    /// Callers pass [`crate::path::table_key_prefix`] output; the trailing
    /// separator keeps table `foo` from sweeping up `foobar`.
    pub fn evict_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "handles evicted by prefix");
        }
    }

    /// Drain the table. Any subsequent lookup re-opens.
    pub fn close_all(&self) {
        let mut entries = self.entries.lock().unwrap();
        let drained = entries.len();
        entries.clear();
        if drained > 0 {
            debug!(drained, "all handles closed");
        }
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the table holds no handles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
