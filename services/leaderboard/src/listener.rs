//! Cache-invalidation listener.
//!
//! # Purpose
//! A supervised background task that drains `cache.invalidate` events from the
//! bus and applies them to the cache. Applying a batch is idempotent (deletes
//! of absent keys are no-ops), so a failed batch is retried whole with capped
//! exponential backoff instead of tracking partial progress.
//!
//! Events that fail to decode, and event types this consumer does not handle,
//! are logged and dropped; one bad payload must not wedge the stream.
use crate::cache::CacheLayer;
use crate::model::{Envelope, Event, TOPIC_CACHE_INVALIDATE};
use arcade_bus::Bus;
use arcade_cache::{CacheError, CachePattern};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct InvalidationListener {
    bus: Arc<Bus>,
    cache: CacheLayer,
    idle: Duration,
    backoff: Duration,
    backoff_max: Duration,
}

/// Handle to a running listener; dropping it does not stop the task.
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal shutdown and wait for the task to drain its current event.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "invalidation listener task panicked");
        }
    }
}

impl InvalidationListener {
    pub fn new(
        bus: Arc<Bus>,
        cache: CacheLayer,
        idle: Duration,
        backoff: Duration,
        backoff_max: Duration,
    ) -> Self {
        Self {
            bus,
            cache,
            idle,
            backoff,
            backoff_max,
        }
    }

    pub fn spawn(self) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        ListenerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(topic = TOPIC_CACHE_INVALIDATE, "invalidation listener started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                consumed = self.bus.consume_timeout(TOPIC_CACHE_INVALIDATE, self.idle) => {
                    let Some(payload) = consumed else {
                        // Idle wakeup so shutdown is observed promptly.
                        continue;
                    };
                    self.handle(&payload, &mut shutdown).await;
                }
            }
        }
        tracing::info!("invalidation listener stopped");
    }

    async fn handle(&self, payload: &[u8], shutdown: &mut watch::Receiver<bool>) {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable invalidation event");
                metrics::counter!("arcade_listener_dropped_total", "reason" => "decode")
                    .increment(1);
                return;
            }
        };
        let instruction = match envelope.event {
            Event::CacheInvalidate(instruction) => instruction,
            other => {
                tracing::warn!(topic = other.topic(), "dropping unexpected event type");
                metrics::counter!("arcade_listener_dropped_total", "reason" => "unexpected")
                    .increment(1);
                return;
            }
        };

        let mut delay = self.backoff;
        loop {
            match self.apply(&instruction.keys, &instruction.patterns).await {
                Ok(removed) => {
                    metrics::counter!("arcade_invalidations_applied_total").increment(1);
                    tracing::debug!(
                        keys = instruction.keys.len(),
                        patterns = instruction.patterns.len(),
                        removed,
                        "applied cache invalidation"
                    );
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, retry_in_ms = delay.as_millis() as u64,
                        "cache invalidation failed, retrying");
                    metrics::counter!("arcade_listener_retries_total").increment(1);
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                tracing::warn!("shutdown during invalidation retry, batch dropped");
                                return;
                            }
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = (delay * 2).min(self.backoff_max);
                }
            }
        }
    }

    async fn apply(&self, keys: &[String], patterns: &[String]) -> Result<u64, CacheError> {
        self.cache.invalidate_keys(keys).await?;
        let mut removed = keys.len() as u64;
        for raw in patterns {
            let pattern = CachePattern::from_wire(raw);
            removed += self.cache.invalidate_pattern(&pattern).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CacheInvalidate;
    use arcade_cache::{CacheBackend, CacheKey, MemoryCache};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn listener(bus: Arc<Bus>, backend: Arc<dyn CacheBackend>) -> InvalidationListener {
        InvalidationListener::new(
            bus,
            CacheLayer::new(backend, Duration::from_millis(250)),
            Duration::from_millis(20),
            Duration::from_millis(5),
            Duration::from_millis(40),
        )
    }

    async fn publish_invalidate(bus: &Bus, keys: Vec<String>, patterns: Vec<String>) {
        let payload = Envelope::new(Event::CacheInvalidate(CacheInvalidate { keys, patterns }))
            .encode()
            .expect("encode");
        bus.publish(TOPIC_CACHE_INVALIDATE, payload).await.expect("publish");
    }

    async fn wait_until_absent(backend: &MemoryCache, key: &str) {
        for _ in 0..100 {
            if backend.get(key).await.expect("get").is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("key {key} still cached");
    }

    #[tokio::test]
    async fn applies_keys_and_patterns() {
        let bus = Arc::new(Bus::new());
        let backend = Arc::new(MemoryCache::new());
        for key in ["ranking:doom:10", "ranking:doom:50", "stats:game:doom", "ranking:wolf:10"] {
            backend
                .set(key, Bytes::from_static(b"[]"), None)
                .await
                .expect("set");
        }
        let handle = listener(bus.clone(), backend.clone()).spawn();

        publish_invalidate(
            &bus,
            vec![CacheKey::game_stats("doom").into_string()],
            vec![CachePattern::game_rankings("doom").as_str().to_string()],
        )
        .await;

        wait_until_absent(&backend, "ranking:doom:10").await;
        wait_until_absent(&backend, "ranking:doom:50").await;
        wait_until_absent(&backend, "stats:game:doom").await;
        // Other games are untouched.
        assert!(backend.get("ranking:wolf:10").await.expect("get").is_some());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn garbage_and_foreign_events_are_dropped() {
        let bus = Arc::new(Bus::new());
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("ranking:doom:10", Bytes::from_static(b"[]"), None)
            .await
            .expect("set");
        let handle = listener(bus.clone(), backend.clone()).spawn();

        bus.publish(TOPIC_CACHE_INVALIDATE, Bytes::from_static(b"not json"))
            .await
            .expect("publish");
        let foreign = Envelope::new(Event::Unknown).encode().expect("encode");
        bus.publish(TOPIC_CACHE_INVALIDATE, foreign).await.expect("publish");
        // A valid event after the bad ones proves the stream is not wedged.
        publish_invalidate(&bus, vec!["ranking:doom:10".into()], vec![]).await;

        wait_until_absent(&backend, "ranking:doom:10").await;
        handle.shutdown().await;
    }

    /// Fails every delete until the countdown reaches zero.
    struct FlakyBackend {
        inner: MemoryCache,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl CacheBackend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
            self.inner.get(key).await
        }
        async fn set(
            &self,
            key: &str,
            value: Bytes,
            ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(CacheError::Unavailable("injected".into()));
            }
            self.inner.delete(key).await
        }
        async fn delete_pattern(&self, pattern: &CachePattern) -> Result<u64, CacheError> {
            self.inner.delete_pattern(pattern).await
        }
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn retries_until_the_cache_recovers() {
        let bus = Arc::new(Bus::new());
        let backend = Arc::new(FlakyBackend {
            inner: MemoryCache::new(),
            failures_left: AtomicUsize::new(2),
        });
        backend
            .inner
            .set("stats:game:doom", Bytes::from_static(b"{}"), None)
            .await
            .expect("set");
        let handle = listener(bus.clone(), backend.clone()).spawn();

        publish_invalidate(&bus, vec!["stats:game:doom".into()], vec![]).await;

        wait_until_absent(&backend.inner, "stats:game:doom").await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_listener() {
        let bus = Arc::new(Bus::new());
        let backend = Arc::new(MemoryCache::new());
        let handle = listener(bus, backend).spawn();
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("listener should stop promptly");
    }
}
