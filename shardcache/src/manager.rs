//! Cache manager orchestrating stores, sweeping, and size enforcement.
//!
//! The manager owns the global configuration and the handle table behind
//! one reader/writer lock. `get` takes the read side, so lookups on
//! different files proceed in parallel; `set`, `delete`, `init`, and
//! `close` take the write side. Handle-table mutation on the `get` path
//! (open-if-absent) stays serialized by the table's own mutex.
//!
//! State machine: `Uninitialized` -(init)-> `Ready` -(close)->
//! `Uninitialized`. Every operation other than `init` is valid only in
//! `Ready`.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::eviction::enforce_size;
use crate::handles::HandleTable;
use crate::path::{
    cache_file_path, handle_key, table_directory, table_key_prefix, tenant_directory,
    validate_bind,
};
use crate::stats::CacheStats;
use crate::store::{now_unix, StoreOptions};
use crate::sweep::sweep_stale;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Everything that exists only while the manager is `Ready`.
struct ManagerState {
    config: CacheConfig,
    options: StoreOptions,
    handles: HandleTable,
    stats: Mutex<CacheStats>,
}

impl ManagerState {
    /// Sweep a tenant directory, absorbing sweep failures.
    ///
    /// A failed unlink must never mask the miss (or the write) that
    /// triggered the sweep; the error is logged and the operation
    /// proceeds.
    fn sweep_tenant(&self, table: &str, tenant: &str, tenant_dir: &Path, freshness: &str) {
        match sweep_stale(&self.handles, table, tenant, tenant_dir, freshness) {
            Ok(swept) => self.stats.lock().unwrap().record_swept(swept),
            Err(err) => {
                warn!(table, tenant, error = %err, "staleness sweep failed");
            }
        }
    }

    /// Drop a corrupt cache file: evict its handle and unlink it so the
    /// next operation starts from a clean slate.
    fn discard_corrupt_file(&self, key: &str, path: &Path, reason: &str) {
        warn!(path = %path.display(), reason, "discarding corrupt cache file");
        self.handles.evict(key);
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove corrupt cache file");
            }
        }
    }
}

/// Process-local cache manager.
///
/// `new` is `const`, so front-ends that need process-wide state can keep
/// a manager in a `static`; the embedded use keeps it in a local.
pub struct CacheManager {
    state: RwLock<Option<ManagerState>>,
}

impl CacheManager {
    /// Create an uninitialized manager.
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Initialize (or reinitialize) the cache.
    ///
    /// Creates `base_dir` recursively if absent. A manager that is
    /// already `Ready` is reinitialized: prior handles are closed and the
    /// configuration replaced.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a `cap` outside `[0, 0.95]` or a zero
    /// `max_size_mb`; `Io` when `base_dir` cannot be created.
    pub fn init(&self, base_dir: impl Into<std::path::PathBuf>, max_size_mb: u64, cap: f64) -> Result<()> {
        let config = CacheConfig::new(base_dir, max_size_mb, cap)?;
        fs::create_dir_all(config.base_dir())?;

        let mut guard = self.state.write().unwrap();
        if let Some(old) = guard.take() {
            old.handles.close_all();
            info!("cache reinitialized, prior handles closed");
        }

        info!(
            base_dir = %config.base_dir().display(),
            max_size_mb = config.max_size_mb,
            cap = config.cap,
            "cache initialized"
        );

        *guard = Some(ManagerState {
            options: StoreOptions::from_config(&config),
            config,
            handles: HandleTable::new(),
            stats: Mutex::new(CacheStats::new()),
        });
        Ok(())
    }

    /// Look up `bind` in the cache file for `(table, tenant, freshness)`.
    ///
    /// A missing cache file triggers a staleness sweep of the tenant
    /// directory before the `Miss` is returned; a present file has the
    /// row's `last_accessed` stamped as a side effect. A corrupt file is
    /// discarded and reported as a `Miss`.
    ///
    /// # Errors
    ///
    /// `Miss` for an absent file or bind, `NotInitialized` outside
    /// `Ready`, plus the store's error taxonomy.
    pub fn get(&self, table: &str, tenant: &str, freshness: &str, bind: &str) -> Result<Vec<u8>> {
        let guard = self.state.read().unwrap();
        let state = guard.as_ref().ok_or(CacheError::NotInitialized)?;

        let path = cache_file_path(state.config.base_dir(), table, tenant, freshness)?;
        let key = handle_key(table, tenant, freshness)?;
        validate_bind(bind)?;

        if !path.exists() {
            let tenant_dir = tenant_directory(state.config.base_dir(), table, tenant)?;
            state.sweep_tenant(table, tenant, &tenant_dir, freshness);
            state.stats.lock().unwrap().record_miss();
            return Err(CacheError::Miss("cache file not found".to_string()));
        }

        let store = match state.handles.get_or_open(&key, &path, &state.options) {
            Ok(store) => store,
            Err(CacheError::Corrupt(reason)) => {
                state.discard_corrupt_file(&key, &path, &reason);
                state.stats.lock().unwrap().record_miss();
                return Err(CacheError::Miss("corrupt cache file discarded".to_string()));
            }
            Err(err) => return Err(err),
        };
        match store.read_and_touch(bind, now_unix()) {
            Ok(content) => {
                state.stats.lock().unwrap().record_hit();
                Ok(content)
            }
            Err(err @ CacheError::Miss(_)) => {
                state.stats.lock().unwrap().record_miss();
                Err(err)
            }
            Err(CacheError::Corrupt(reason)) => {
                state.discard_corrupt_file(&key, &path, &reason);
                state.stats.lock().unwrap().record_miss();
                Err(CacheError::Miss("corrupt cache file discarded".to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Store `content` under `bind` in the cache file for
    /// `(table, tenant, freshness)`.
    ///
    /// Creates the file on first write. A missing file triggers a
    /// staleness sweep first — this is where a tenant's older freshness
    /// siblings are removed. A corrupt file is discarded and recreated
    /// in place. The size enforcer runs before the write.
    ///
    /// # Errors
    ///
    /// `DiskFull` when the row cannot fit even after a cull (callers
    /// should treat this as a cache bypass), `NotInitialized` outside
    /// `Ready`, plus the store's error taxonomy.
    pub fn set(
        &self,
        table: &str,
        tenant: &str,
        freshness: &str,
        bind: &str,
        content: &[u8],
    ) -> Result<()> {
        let guard = self.state.write().unwrap();
        let state = guard.as_ref().ok_or(CacheError::NotInitialized)?;

        let path = cache_file_path(state.config.base_dir(), table, tenant, freshness)?;
        let key = handle_key(table, tenant, freshness)?;
        validate_bind(bind)?;

        if !path.exists() {
            let tenant_dir = tenant_directory(state.config.base_dir(), table, tenant)?;
            state.sweep_tenant(table, tenant, &tenant_dir, freshness);
        }

        let store = match state.handles.get_or_open(&key, &path, &state.options) {
            Ok(store) => store,
            Err(CacheError::Corrupt(reason)) => {
                state.discard_corrupt_file(&key, &path, &reason);
                // The write proceeds into a fresh file.
                state.handles.get_or_open(&key, &path, &state.options)?
            }
            Err(err) => return Err(err),
        };
        let culled = enforce_size(&store, &state.config)?;
        store.upsert(bind, content, now_unix())?;

        let mut stats = state.stats.lock().unwrap();
        stats.record_culled(culled);
        stats.record_write();
        Ok(())
    }

    /// Drop every cached tenant of `table`: evict its handles, then
    /// remove its directory tree. A missing directory is success.
    pub fn delete(&self, table: &str) -> Result<()> {
        let guard = self.state.write().unwrap();
        let state = guard.as_ref().ok_or(CacheError::NotInitialized)?;

        let table_dir = table_directory(state.config.base_dir(), table)?;
        state.handles.evict_prefix(&table_key_prefix(table));

        match fs::remove_dir_all(&table_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        info!(table, "table cache deleted");
        Ok(())
    }

    /// Close the cache: drain all handles and clear the configuration.
    ///
    /// After `close`, every operation other than `init` fails with
    /// `NotInitialized`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.state.write().unwrap();
        let state = guard.take().ok_or(CacheError::NotInitialized)?;
        state.handles.close_all();
        info!("cache closed");
        Ok(())
    }

    /// Snapshot of the counters recorded since `init`.
    pub fn stats(&self) -> Result<CacheStats> {
        let guard = self.state.read().unwrap();
        let state = guard.as_ref().ok_or(CacheError::NotInitialized)?;
        let stats = state.stats.lock().unwrap();
        Ok(stats.clone())
    }

    /// Whether the manager is in the `Ready` state.
    pub fn is_initialized(&self) -> bool {
        self.state.read().unwrap().is_some()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ready_manager(dir: &TempDir) -> CacheManager {
        let manager = CacheManager::new();
        manager.init(dir.path().join("cache"), 100, 0.8).unwrap();
        manager
    }

    #[test]
    fn test_operations_before_init_fail() {
        let manager = CacheManager::new();
        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::NotInitialized
        ));
        assert!(matches!(
            manager.set("users", "t1", "f1", "k1", b"v").unwrap_err(),
            CacheError::NotInitialized
        ));
        assert!(matches!(
            manager.delete("users").unwrap_err(),
            CacheError::NotInitialized
        ));
        assert!(matches!(manager.close().unwrap_err(), CacheError::NotInitialized));
    }

    #[test]
    fn test_init_creates_base_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("a").join("b").join("cache");

        let manager = CacheManager::new();
        manager.init(&base, 100, 0.8).unwrap();

        assert!(base.is_dir());
        assert!(manager.is_initialized());
    }

    #[test]
    fn test_init_rejects_out_of_range_cap() {
        let dir = TempDir::new().unwrap();
        let manager = CacheManager::new();

        let err = manager.init(dir.path().join("cache"), 10, 0.96).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"hello").unwrap();
        assert_eq!(manager.get("users", "t1", "f1", "k1").unwrap(), b"hello");
    }

    #[test]
    fn test_get_unknown_bind_is_miss() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"hello").unwrap();
        assert!(matches!(
            manager.get("users", "t1", "f1", "k2").unwrap_err(),
            CacheError::Miss(_)
        ));
    }

    #[test]
    fn test_get_unknown_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::Miss(_)
        ));
    }

    #[test]
    fn test_freshness_rotation_sweeps_old_file() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v1").unwrap();
        let old_file = dir.path().join("cache/users/t1/f1.db");
        assert!(old_file.exists());

        // A lookup under the new token misses and sweeps the old file.
        assert!(manager.get("users", "t1", "f2", "k1").is_err());
        assert!(!old_file.exists());

        // Writes under the new token repopulate the tenant.
        manager.set("users", "t1", "f2", "k1", b"v2").unwrap();
        assert_eq!(manager.get("users", "t1", "f2", "k1").unwrap(), b"v2");
    }

    #[test]
    fn test_set_under_new_freshness_sweeps_old_file() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v1").unwrap();
        manager.set("users", "t1", "f2", "k1", b"v2").unwrap();

        assert!(!dir.path().join("cache/users/t1/f1.db").exists());
        assert!(dir.path().join("cache/users/t1/f2.db").exists());
    }

    #[test]
    fn test_tenant_isolation() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"A").unwrap();
        manager.set("users", "t2", "f1", "k1", b"B").unwrap();

        assert_eq!(manager.get("users", "t1", "f1", "k1").unwrap(), b"A");
        assert_eq!(manager.get("users", "t2", "f1", "k1").unwrap(), b"B");
    }

    #[test]
    fn test_delete_removes_table_tree() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.delete("users").unwrap();

        assert!(!dir.path().join("cache/users").exists());
        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::Miss(_)
        ));
    }

    #[test]
    fn test_delete_missing_table_is_success() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);
        manager.delete("never_written").unwrap();
    }

    #[test]
    fn test_close_then_operations_fail() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.close().unwrap();

        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::NotInitialized
        ));
        assert!(matches!(
            manager.set("users", "t1", "f1", "k1", b"v").unwrap_err(),
            CacheError::NotInitialized
        ));
        assert!(matches!(manager.close().unwrap_err(), CacheError::NotInitialized));
    }

    #[test]
    fn test_reinit_after_close() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.close().unwrap();
        manager.init(dir.path().join("cache"), 100, 0.8).unwrap();

        // The file survives close; only handles are dropped.
        assert_eq!(manager.get("users", "t1", "f1", "k1").unwrap(), b"v");
    }

    #[test]
    fn test_init_while_ready_reinitializes() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager
            .init(dir.path().join("cache2"), 50, 0.5)
            .unwrap();

        assert!(manager.is_initialized());
        assert!(dir.path().join("cache2").is_dir());
        // Lookups now resolve against the new base directory.
        assert!(manager.get("users", "t1", "f1", "k1").is_err());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        assert!(matches!(
            manager.get("..", "t1", "f1", "k1").unwrap_err(),
            CacheError::InvalidArgument(_)
        ));
        assert!(matches!(
            manager.set("users", "../..", "f1", "k1", b"v").unwrap_err(),
            CacheError::InvalidArgument(_)
        ));
        assert!(matches!(
            manager.delete("users/evil").unwrap_err(),
            CacheError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_rejects_empty_bind() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        assert!(matches!(
            manager.set("users", "t1", "f1", "", b"v").unwrap_err(),
            CacheError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_corrupt_file_is_discarded_on_get() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.close().unwrap();

        // Clobber the file on disk; the next open sees a non-database.
        let file = dir.path().join("cache/users/t1/f1.db");
        std::fs::write(&file, vec![b'x'; 1024]).unwrap();

        manager.init(dir.path().join("cache"), 100, 0.8).unwrap();
        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::Miss(_)
        ));
        assert!(!file.exists());

        // The tenant is writable again after the discard.
        manager.set("users", "t1", "f1", "k1", b"fresh").unwrap();
        assert_eq!(manager.get("users", "t1", "f1", "k1").unwrap(), b"fresh");
    }

    #[test]
    fn test_corrupt_file_is_replaced_on_set() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.close().unwrap();

        let file = dir.path().join("cache/users/t1/f1.db");
        std::fs::write(&file, vec![b'x'; 1024]).unwrap();

        manager.init(dir.path().join("cache"), 100, 0.8).unwrap();
        manager.set("users", "t1", "f1", "k2", b"fresh").unwrap();

        assert_eq!(manager.get("users", "t1", "f1", "k2").unwrap(), b"fresh");
        // The corrupt file's rows did not survive the rebuild.
        assert!(matches!(
            manager.get("users", "t1", "f1", "k1").unwrap_err(),
            CacheError::Miss(_)
        ));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let dir = TempDir::new().unwrap();
        let manager = ready_manager(&dir);

        manager.set("users", "t1", "f1", "k1", b"v").unwrap();
        manager.get("users", "t1", "f1", "k1").unwrap();
        let _ = manager.get("users", "t1", "f1", "absent");

        let stats = manager.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
