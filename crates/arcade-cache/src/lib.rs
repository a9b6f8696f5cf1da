// Cache primitives for the ranking speed layer: a typed key builder, a
// fallible backend trait, and an in-memory TTL implementation.
//
// The cache is never the source of truth. Every entry is reconstructible from
// the score store, so eviction and expiry are always safe.
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub mod key;

pub use key::{CacheKey, CachePattern};

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out")]
    Timeout,
}

/// Backend contract for the speed layer.
///
/// Implementations may fail (a networked backend can be unreachable); policy
/// for those failures (fail-open, log-and-swallow) belongs to the caller, not
/// the backend.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a value with an optional expiry.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()>;

    /// Delete one key. Deleting an absent key is a no-op, not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern; returns how many were removed.
    async fn delete_pattern(&self, pattern: &CachePattern) -> Result<u64>;

    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory cache with per-entry TTL and lazy expiry.
///
/// ```
/// use arcade_cache::{CacheBackend, MemoryCache};
/// use bytes::Bytes;
///
/// let cache = MemoryCache::new();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     cache
///         .set("ranking:doom:50", Bytes::from_static(b"[]"), None)
///         .await
///         .expect("set");
///     let value = cache.get("ranking:doom:50").await.expect("get");
///     assert_eq!(value, Some(Bytes::from_static(b"[]")));
/// });
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    // RwLock allows concurrent readers while writes take exclusive access.
    inner: RwLock<HashMap<String, Entry>>,
    // Optional size cap; overflow evicts an arbitrary entry.
    max_entries: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_entries: None,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        // Write lock so expired entries can be evicted on read.
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get(key) {
            // Lazy-expire on read to avoid a background sweeper.
            if entry.expired(Instant::now()) {
                guard.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        // Compute expiry once so reads only compare Instants.
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), Entry { value, expires_at });
        if let Some(max_entries) = self.max_entries
            && guard.len() > max_entries
        {
            // Placeholder eviction: remove an arbitrary key until capped.
            if let Some(victim) = guard.keys().next().cloned() {
                guard.remove(&victim);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &CachePattern) -> Result<u64> {
        let mut guard = self.inner.write().await;
        let victims: Vec<String> = guard
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        let removed = victims.len() as u64;
        for key in victims {
            guard.remove(&key);
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(10)))
            .await
            .expect("set");
        sleep(Duration::from_millis(15)).await;
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn delete_absent_key_is_noop() {
        let cache = MemoryCache::new();
        cache.delete("missing").await.expect("delete");
    }

    #[tokio::test]
    async fn pattern_delete_removes_only_matching_keys() {
        let cache = MemoryCache::new();
        for key in ["ranking:doom:10", "ranking:doom:50", "ranking:wolf:50"] {
            cache.set(key, Bytes::from_static(b"[]"), None).await.expect("set");
        }
        let removed = cache
            .delete_pattern(&CachePattern::game_rankings("doom"))
            .await
            .expect("delete pattern");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("ranking:doom:10").await.expect("get"), None);
        assert_eq!(cache.get("ranking:doom:50").await.expect("get"), None);
        assert!(cache.get("ranking:wolf:50").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn capacity_cap_evicts_on_overflow() {
        let cache = MemoryCache::with_capacity(1);
        cache.set("k1", Bytes::from_static(b"a"), None).await.expect("set");
        cache.set("k2", Bytes::from_static(b"b"), None).await.expect("set");
        assert_eq!(cache.len().await, 1);
    }
}
