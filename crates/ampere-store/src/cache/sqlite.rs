//! SQLite read-through cache for store blobs.

use crate::error::{StoreError, StoreResult};
use crate::store::ObjectStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// SQLite table of blobs keyed by store path.
#[derive(Debug)]
pub struct BlobCache {
    conn: Mutex<Connection>,
}

impl BlobCache {
    /// Open or create a cache database.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Cache("cache connection lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        self.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                path TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                size INTEGER NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn cutoff(max_age: Option<Duration>) -> String {
        max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map_or_else(String::new, |age| Self::timestamp(Utc::now() - age))
    }

    /// Get a blob cached no longer than `max_age` ago (`None` accepts any age).
    pub fn get(&self, path: &str, max_age: Option<Duration>) -> StoreResult<Option<Vec<u8>>> {
        let result = self
            .conn()?
            .query_row(
                "SELECT data FROM blobs WHERE path = ?1 AND cached_at >= ?2",
                params![path, Self::cutoff(max_age)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    /// Store a blob, replacing any previous copy.
    pub fn put(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let cached_at = Self::timestamp(Utc::now());
        self.conn()?.execute(
            "INSERT OR REPLACE INTO blobs (path, data, size, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![path, data, data.len() as i64, cached_at],
        )?;
        Ok(())
    }

    /// Check if a blob was cached no longer than `max_age` ago.
    pub fn has_fresh(&self, path: &str, max_age: Option<Duration>) -> StoreResult<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM blobs WHERE path = ?1 AND cached_at >= ?2",
            params![path, Self::cutoff(max_age)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove one blob. Returns whether it was cached.
    pub fn remove(&self, path: &str) -> StoreResult<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM blobs WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }

    /// Remove every blob whose path starts with `prefix`.
    pub fn remove_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let removed = self.conn()?.execute(
            "DELETE FROM blobs WHERE path LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(removed)
    }

    /// Clear all cached blobs.
    pub fn clear(&self) -> StoreResult<()> {
        self.conn()?.execute("DELETE FROM blobs", [])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn stats(&self) -> StoreResult<CacheStats> {
        let conn = self.conn()?;
        let (entries, total_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM blobs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(cached_at), MAX(cached_at) FROM blobs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let parse = |s: Option<String>| {
            s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|d| d.with_timezone(&Utc))
        };

        Ok(CacheStats {
            entries: entries as usize,
            total_bytes: total_bytes as u64,
            oldest: parse(oldest),
            newest: parse(newest),
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached blobs
    pub entries: usize,
    /// Total size of cached blobs in bytes
    pub total_bytes: u64,
    /// When the oldest blob was cached
    pub oldest: Option<DateTime<Utc>>,
    /// When the newest blob was cached
    pub newest: Option<DateTime<Utc>>,
}

/// Read-through cache in front of another store.
///
/// Fresh hits are served from SQLite; misses go to the inner store and are
/// written back. Cache failures are logged and never fail a read.
#[derive(Debug, Clone)]
pub struct CachedStore {
    inner: Arc<dyn ObjectStore>,
    cache: Arc<BlobCache>,
    max_age: Option<Duration>,
}

impl CachedStore {
    /// Put `cache` in front of `inner`; entries older than `max_age` are refetched.
    pub fn new(inner: Arc<dyn ObjectStore>, cache: Arc<BlobCache>, max_age: Option<Duration>) -> Self {
        Self {
            inner,
            cache,
            max_age,
        }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    /// Run a SQLite call on the blocking pool.
    async fn with_cache<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&BlobCache) -> StoreResult<T> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || f(&cache))
            .await
            .map_err(|e| StoreError::Cache(format!("cache task failed: {e}")))?
    }
}

#[async_trait]
impl ObjectStore for CachedStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let key = path.to_string();
        let max_age = self.max_age;
        match self.with_cache(move |cache| cache.get(&key, max_age)).await {
            Ok(Some(bytes)) => {
                debug!(path, bytes = bytes.len(), "blob cache hit");
                return Ok(bytes);
            }
            Ok(None) => debug!(path, "blob cache miss"),
            Err(e) => warn!(path, error = %e, "blob cache read failed"),
        }

        let bytes = self.inner.get(path).await?;
        let key = path.to_string();
        let data = bytes.clone();
        if let Err(e) = self.with_cache(move |cache| cache.put(&key, &data)).await {
            warn!(path, error = %e, "blob cache write failed");
        }
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!("{} (cached)", self.inner.describe())
    }
}
