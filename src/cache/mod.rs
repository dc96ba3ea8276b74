//! Cache layer for registry package metadata.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registries::PackageMetadata;

pub mod sqlite;

pub use sqlite::SqliteCache;

/// Trait for cache implementations
pub trait Cache: Send + Sync {
    /// Get a value from the cache
    fn get(&self, key: &str) -> Option<Vec<PackageMetadata>>;
}

impl<T: Cache> Cache for Arc<T> {
    fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        (**self).get(key)
    }
}

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<PackageMetadata>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// In-memory cache using DashMap for thread-safety
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Create a new cache with default TTL
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a value from the cache
    pub fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        self.entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.data.clone())
            }
        })
    }

    /// Insert a value into the cache
    pub fn insert(&self, key: String, value: Vec<PackageMetadata>) {
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                inserted_at: Instant::now(),
                ttl: self.ttl,
            },
        );
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        self.get(key)
    }
}

/// Hybrid cache that uses memory for fast access and SQLite for persistence
pub struct HybridCache {
    memory: MemoryCache,
    sqlite: Option<Arc<SqliteCache>>,
}

impl Default for HybridCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridCache {
    /// Create a new hybrid cache, falling back to memory-only if the
    /// SQLite backing store can't be initialized (e.g. read-only home dir).
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a new hybrid cache with an explicit TTL applied to both tiers.
    pub fn with_ttl(ttl: Duration) -> Self {
        let sqlite = match SqliteCache::with_ttl(ttl.as_secs()) {
            Ok(cache) => {
                tracing::info!("SQLite cache initialized");
                Some(Arc::new(cache))
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SQLite cache, using memory only: {}",
                    e
                );
                None
            }
        };

        Self {
            memory: MemoryCache::with_ttl(ttl),
            sqlite,
        }
    }

    pub fn memory_only() -> Self {
        Self::memory_only_with_ttl(DEFAULT_TTL)
    }

    pub fn memory_only_with_ttl(ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::with_ttl(ttl),
            sqlite: None,
        }
    }

    /// Get a value from the cache (memory first, then SQLite)
    pub fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }

        if let Some(ref sqlite) = self.sqlite
            && let Some(value) = sqlite.get(key)
        {
            self.memory.insert(key.to_string(), value.clone());
            return Some(value);
        }

        None
    }

    /// Insert a value into both caches
    pub fn insert(&self, key: String, value: Vec<PackageMetadata>) {
        self.memory.insert(key.clone(), value.clone());

        if let Some(ref sqlite) = self.sqlite {
            sqlite.insert(key, &value);
        }
    }
}

impl Cache for HybridCache {
    fn get(&self, key: &str) -> Option<Vec<PackageMetadata>> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<PackageMetadata> {
        vec![PackageMetadata {
            version: "1.0.0".parse().unwrap(),
            listed: true,
            description: None,
            project_url: None,
            license_expression: None,
            license_url: None,
            authors: None,
            owners: None,
            tags: None,
            deprecated: false,
            published: None,
            dependency_groups: vec![],
        }]
    }

    #[test]
    fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        cache.insert("nuget:foo".to_string(), sample());
        assert!(cache.get("nuget:foo").is_some());
        assert!(cache.get("nuget:bar").is_none());
    }

    #[test]
    fn memory_cache_expires_entries() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(1));
        cache.insert("nuget:foo".to_string(), sample());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("nuget:foo").is_none());
    }

    #[test]
    fn hybrid_cache_memory_only_round_trips() {
        let cache = HybridCache::memory_only();
        cache.insert("nuget:foo".to_string(), sample());
        assert!(cache.get("nuget:foo").is_some());
    }
}
