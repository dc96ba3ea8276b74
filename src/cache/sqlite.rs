//! SQLite persistent cache for registry package metadata.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};

use crate::registries::PackageMetadata;

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL_SECS: i64 = 3600;

/// SQLite-based persistent cache
pub struct SqliteCache {
    conn: Mutex<Connection>,
    ttl_secs: i64,
}

impl SqliteCache {
    /// Create a new SQLite cache at the default location (~/.cache/dotnet-depgraph/cache.db)
    pub fn new() -> anyhow::Result<Self> {
        Self::with_ttl(DEFAULT_TTL_SECS as u64)
    }

    /// Create a new SQLite cache at the default location with a custom TTL.
    pub fn with_ttl(ttl_secs: u64) -> anyhow::Result<Self> {
        let cache_dir = Self::cache_dir()?;
        std::fs::create_dir_all(&cache_dir)?;
        let db_path = cache_dir.join("cache.db");
        Self::with_path_and_ttl(db_path, ttl_secs)
    }

    /// Create a new SQLite cache at a custom path
    pub fn with_path(path: PathBuf) -> anyhow::Result<Self> {
        Self::with_path_and_ttl(path, DEFAULT_TTL_SECS as u64)
    }

    /// Create a new SQLite cache at a custom path with a custom TTL.
    pub fn with_path_and_ttl(path: PathBuf, ttl_secs: u64) -> anyhow::Result<Self> {
        let conn = Connection::open(&path)?;
        let cache = Self {
            conn: Mutex::new(conn),
            ttl_secs: ttl_secs as i64,
        };
        cache.init_schema()?;
        cache.cleanup_expired()?;
        Ok(cache)
    }

    /// Create an in-memory cache (for testing)
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
            ttl_secs: DEFAULT_TTL_SECS,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Get the cache directory
    fn cache_dir() -> anyhow::Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
        Ok(cache_dir.join("dotnet-depgraph"))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS packages (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                inserted_at INTEGER NOT NULL,
                ttl_secs INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_expiry ON packages(inserted_at, ttl_secs)",
            [],
        )?;
        Ok(())
    }

    /// Get a value from the cache
    pub fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        let conn = self.conn.lock().unwrap();
        let now = current_timestamp();

        let result: Result<(String, i64, i64), _> = conn.query_row(
            "SELECT data, inserted_at, ttl_secs FROM packages WHERE key = ?",
            [key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        );

        match result {
            Ok((data, inserted_at, ttl_secs)) => {
                if now > inserted_at + ttl_secs {
                    let _ = conn.execute("DELETE FROM packages WHERE key = ?", [key]);
                    None
                } else {
                    serde_json::from_str(&data).ok()
                }
            }
            Err(_) => None,
        }
    }

    /// Insert a value into the cache
    pub fn insert(&self, key: String, value: &[PackageMetadata]) {
        let conn = self.conn.lock().unwrap();
        let now = current_timestamp();
        let data = match serde_json::to_string(value) {
            Ok(d) => d,
            Err(_) => return,
        };

        let _ = conn.execute(
            "INSERT OR REPLACE INTO packages (key, data, inserted_at, ttl_secs) VALUES (?, ?, ?, ?)",
            params![key, data, now, self.ttl_secs],
        );
    }

    pub fn cleanup_expired(&self) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = current_timestamp();
        let rows = conn.execute(
            "DELETE FROM packages WHERE inserted_at + ttl_secs < ?",
            [now],
        )?;
        Ok(rows)
    }
}

/// Get current Unix timestamp
fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
