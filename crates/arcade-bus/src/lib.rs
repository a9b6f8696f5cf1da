// In-process event queue with per-topic FIFO ordering and blocking consumption.
// Producers append to the tail and never wait for consumers; consumers compete
// for items and each item is removed exactly once. Delivery is at-least-once
// overall: an item popped by a consumer that dies before finishing its effect
// is lost to the queue, so consumer effects must be idempotent.
use ahash::RandomState;
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("topic name must not be empty")]
    EmptyTopic,
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

const DEFAULT_MAX_PAYLOAD: usize = 1 << 20;

#[derive(Debug)]
struct TopicState {
    // Tail-append queue; pop is destructive, FIFO within this topic only.
    queue: Mutex<VecDeque<QueuedItem>>,
    // One permit per published item so competing consumers wake exactly once each.
    notify: Notify,
    // Approximate depth, kept outside the lock for cheap gauge updates.
    depth: AtomicUsize,
}

#[derive(Debug)]
struct QueuedItem {
    payload: Bytes,
    enqueued_at: Instant,
}

impl TopicState {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            depth: AtomicUsize::new(0),
        }
    }

    fn push(&self, payload: Bytes) {
        self.queue.lock().push_back(QueuedItem {
            payload,
            enqueued_at: Instant::now(),
        });
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::gauge!("arcade_bus_queue_depth").set(depth as f64);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Bytes> {
        let item = self.queue.lock().pop_front()?;
        let depth = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .unwrap_or(0);
        metrics::gauge!("arcade_bus_queue_depth").set(depth.saturating_sub(1) as f64);
        metrics::histogram!("arcade_bus_queue_wait_seconds")
            .record(item.enqueued_at.elapsed().as_secs_f64());
        Some(item.payload)
    }
}

/// Multi-producer/multi-consumer topic queue.
///
/// ```
/// use arcade_bus::Bus;
/// use bytes::Bytes;
///
/// let bus = Bus::new();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     bus.publish("score.created", Bytes::from_static(b"{}"))
///         .await
///         .expect("publish");
///     let item = bus.consume("score.created").await;
///     assert_eq!(item, Bytes::from_static(b"{}"));
/// });
/// ```
#[derive(Debug)]
pub struct Bus {
    // Topic registry; topics are created lazily on first publish or consume.
    topics: RwLock<HashMap<String, Arc<TopicState>, RandomState>>,
    // Guard against runaway payloads; events are small JSON documents.
    max_payload: usize,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::default()),
            max_payload,
        }
    }

    async fn topic(&self, topic: &str) -> Arc<TopicState> {
        if let Some(state) = self.topics.read().await.get(topic) {
            return Arc::clone(state);
        }
        let mut topics = self.topics.write().await;
        Arc::clone(
            topics
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicState::new())),
        )
    }

    /// Append a payload to the tail of the topic's queue.
    ///
    /// Returns once the item is recorded. Never blocks waiting for a consumer;
    /// a topic with no consumers simply accumulates items.
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }
        if payload.len() > self.max_payload {
            return Err(BusError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        let state = self.topic(topic).await;
        state.push(payload);
        metrics::counter!("arcade_bus_published_total", "topic" => topic.to_string()).increment(1);
        Ok(())
    }

    /// Block until an item is available, then remove and return the oldest one.
    ///
    /// The pop is destructive: once returned, the item is gone from the queue
    /// even if the caller subsequently fails.
    pub async fn consume(&self, topic: &str) -> Bytes {
        let state = self.topic(topic).await;
        loop {
            // Arm the notification before checking the queue so a publish that
            // lands between the check and the await is not missed.
            let notified = state.notify.notified();
            if let Some(payload) = state.pop() {
                metrics::counter!("arcade_bus_consumed_total", "topic" => topic.to_string())
                    .increment(1);
                return payload;
            }
            notified.await;
        }
    }

    /// Like [`Bus::consume`], but returns `None` after `idle` with no item,
    /// giving long-running consumers a liveness checkpoint.
    pub async fn consume_timeout(&self, topic: &str, idle: Duration) -> Option<Bytes> {
        tokio::time::timeout(idle, self.consume(topic)).await.ok()
    }

    /// Current number of undelivered items in a topic.
    pub async fn depth(&self, topic: &str) -> usize {
        match self.topics.read().await.get(topic) {
            Some(state) => state.depth.load(Ordering::Relaxed),
            None => 0,
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fifo_within_topic() {
        let bus = Bus::new();
        for i in 0..5u8 {
            bus.publish("t", Bytes::copy_from_slice(&[i])).await.expect("publish");
        }
        for i in 0..5u8 {
            assert_eq!(bus.consume("t").await, Bytes::copy_from_slice(&[i]));
        }
    }

    #[tokio::test]
    async fn consume_blocks_until_publish() {
        let bus = Arc::new(Bus::new());
        let consumer = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.consume("t").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());
        bus.publish("t", Bytes::from_static(b"late")).await.expect("publish");
        assert_eq!(consumer.await.expect("join"), Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn consume_timeout_reports_idle() {
        let bus = Bus::new();
        let item = bus.consume_timeout("t", Duration::from_millis(10)).await;
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = Bus::new();
        bus.publish("a", Bytes::from_static(b"1")).await.expect("publish");
        assert!(bus.consume_timeout("b", Duration::from_millis(10)).await.is_none());
        assert_eq!(bus.depth("a").await, 1);
        assert_eq!(bus.depth("b").await, 0);
    }

    #[tokio::test]
    async fn competing_consumers_each_remove_distinct_items() {
        let bus = Arc::new(Bus::new());
        for i in 0..4u8 {
            bus.publish("t", Bytes::copy_from_slice(&[i])).await.expect("publish");
        }
        let mut handles = Vec::new();
        for _ in 0..4 {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move { bus.consume("t").await }));
        }
        let mut seen: Vec<u8> = Vec::new();
        for handle in handles {
            seen.push(handle.await.expect("join")[0]);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(bus.depth("t").await, 0);
    }

    #[tokio::test]
    async fn rejects_empty_topic_and_oversized_payload() {
        let bus = Bus::with_max_payload(4);
        assert!(matches!(
            bus.publish("", Bytes::from_static(b"x")).await,
            Err(BusError::EmptyTopic)
        ));
        assert!(matches!(
            bus.publish("t", Bytes::from_static(b"toolarge")).await,
            Err(BusError::PayloadTooLarge { .. })
        ));
    }
}
