//! Fail-open cache wrapper for the ranking speed layer.
//!
//! # Purpose
//! Wraps a [`CacheBackend`] with the read-path policy from the ranking
//! pipeline: a backend failure or slow response is a miss, never an error the
//! caller sees. Writes are logged and swallowed; the authoritative store
//! always backs the read path. Invalidation is the one surface that reports
//! failure, so the invalidation listener can retry.
use arcade_cache::{CacheBackend, CacheError, CacheKey, CachePattern};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    /// Bound on any single backend call; a stalled cache must not stall a
    /// request.
    op_timeout: Duration,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
        }
    }

    /// Fetch and decode a cached value. Any failure (backend error, timeout,
    /// undecodable payload) degrades to a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let fetched = timeout(self.op_timeout, self.backend.get(key.as_str())).await;
        let payload = match fetched {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => {
                metrics::counter!("arcade_cache_misses_total").increment(1);
                return None;
            }
            Ok(Err(err)) => {
                tracing::warn!(key = %key, error = %err, "cache get failed; treating as miss");
                metrics::counter!("arcade_cache_errors_total", "op" => "get").increment(1);
                return None;
            }
            Err(_) => {
                tracing::warn!(key = %key, "cache get timed out; treating as miss");
                metrics::counter!("arcade_cache_errors_total", "op" => "get").increment(1);
                return None;
            }
        };
        match serde_json::from_slice(&payload) {
            Ok(value) => {
                metrics::counter!("arcade_cache_hits_total").increment(1);
                Some(value)
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cached payload undecodable; treating as miss");
                None
            }
        }
    }

    /// Store a computed value. Failures are logged and swallowed; the caller
    /// has already produced the value from the authoritative store.
    pub async fn put_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => Bytes::from(payload),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to serialize cache value");
                return;
            }
        };
        let stored = timeout(
            self.op_timeout,
            self.backend.set(key.as_str(), payload, Some(ttl)),
        )
        .await;
        match stored {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(key = %key, error = %err, "cache set failed; continuing without cache");
                metrics::counter!("arcade_cache_errors_total", "op" => "set").increment(1);
            }
            Err(_) => {
                tracing::warn!(key = %key, "cache set timed out; continuing without cache");
                metrics::counter!("arcade_cache_errors_total", "op" => "set").increment(1);
            }
        }
    }

    /// Delete exact keys. Deleting an absent key is a no-op; the first real
    /// failure is returned so the listener can back off and retry.
    pub async fn invalidate_keys(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            match timeout(self.op_timeout, self.backend.delete(key)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(CacheError::Timeout),
            }
        }
        metrics::counter!("arcade_cache_invalidations_total", "kind" => "key")
            .increment(keys.len() as u64);
        Ok(())
    }

    /// Delete every key matching a pattern; returns how many were evicted.
    pub async fn invalidate_pattern(&self, pattern: &CachePattern) -> Result<u64, CacheError> {
        let removed = match timeout(self.op_timeout, self.backend.delete_pattern(pattern)).await {
            Ok(result) => result?,
            Err(_) => return Err(CacheError::Timeout),
        };
        metrics::counter!("arcade_cache_invalidations_total", "kind" => "pattern")
            .increment(removed);
        Ok(removed)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }
}
