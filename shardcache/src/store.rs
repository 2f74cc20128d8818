//! Per-file SQLite store.
//!
//! One `FileStore` owns one cache file: a single-tenant, single-freshness
//! key-value table plus its indices. The file is the source of truth; no
//! bind values are cached in memory beyond a single operation.
//!
//! Durability is explicitly not a goal. Journaling is off and
//! synchronization is "normal": a crash loses the cache file, which the
//! staleness sweep later replaces.

use crate::config::{CacheConfig, PAGE_SIZE};
use crate::error::{CacheError, Result};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bind TEXT NOT NULL,
    content BLOB NOT NULL,
    last_accessed INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_cache_bind ON cache(bind);
CREATE INDEX IF NOT EXISTS idx_cache_last_accessed ON cache(last_accessed);
";

/// Per-file engine options derived from the cache configuration.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// SQLite page-count ceiling for the file.
    pub max_page_count: u64,
}

impl StoreOptions {
    /// Derive the per-file options from the engine configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_page_count: config.max_page_count(),
        }
    }
}

/// An open cache file.
///
/// The connection sits behind a mutex so a store can be shared across
/// threads; each operation holds the lock for exactly one statement (or
/// one implicit transaction).
pub struct FileStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl FileStore {
    /// Open or create the cache file at `path`.
    ///
    /// Ensures parent directories exist, applies the engine pragmas, and
    /// creates the schema if absent. Idempotent for schema creation.
    ///
    /// # Errors
    ///
    /// `Io` for filesystem failures, `DiskFull` / `Corrupt` when the file
    /// engine reports them.
    pub fn open_or_create(path: &Path, options: &StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "OFF")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "page_size", PAGE_SIZE as i64)?;
        conn.pragma_update(None, "max_page_count", options.max_page_count as i64)?;

        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), "cache file opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the content for `bind`, stamping `last_accessed = now` in
    /// the same statement.
    ///
    /// # Errors
    ///
    /// `Miss` if no row matches `bind`.
    pub fn read_and_touch(&self, bind: &str, now: i64) -> Result<Vec<u8>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "UPDATE cache SET last_accessed = ?1 WHERE bind = ?2 RETURNING content",
            params![now, bind],
            |row| row.get(0),
        )
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                CacheError::Miss(format!("cache entry not found: {}", bind))
            }
            other => other.into(),
        })
    }

    /// Insert `bind` or replace its existing row.
    ///
    /// A replaced row keeps its id, so the insertion-order tie-break of
    /// the LRU cull stays stable across overwrites.
    ///
    /// # Errors
    ///
    /// `DiskFull` when the file cannot grow.
    pub fn upsert(&self, bind: &str, content: &[u8], now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache (bind, content, last_accessed) VALUES (?1, ?2, ?3)
             ON CONFLICT(bind) DO UPDATE SET
                 content = excluded.content,
                 last_accessed = excluded.last_accessed",
            params![bind, content, now],
        )?;
        Ok(())
    }

    /// Byte size of the backing file.
    pub fn file_size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Number of rows in the file.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete all but the `keep_count` most recently accessed rows.
    ///
    /// Rows with the smallest `last_accessed` go first; ties fall back to
    /// insertion order. Returns the number of rows removed.
    pub fn cull_oldest(&self, keep_count: u64) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        let delete = (total as u64).saturating_sub(keep_count);
        if delete == 0 {
            return Ok(0);
        }

        let removed = conn.execute(
            "DELETE FROM cache WHERE id IN (
                 SELECT id FROM cache ORDER BY last_accessed ASC, id ASC LIMIT ?1
             )",
            params![delete as i64],
        )?;
        Ok(removed as u64)
    }

    /// Reclaim space freed by deleted rows.
    pub fn compact(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

/// Current wall-clock time as seconds since the Unix epoch.
///
/// A clock before the epoch yields 0 rather than failing; `last_accessed`
/// ordering degrades to insertion order in that case.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
