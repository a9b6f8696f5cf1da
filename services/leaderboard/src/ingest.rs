//! Score ingestion service.
//!
//! # Purpose
//! The single write path into the score store. Validates a submission,
//! applies the conditional strictly-higher-wins transaction, and on
//! acceptance publishes the domain event plus the cache invalidation that
//! keeps downstream rankings converging.
//!
//! # Ordering of effects
//! The store commit happens first; publication follows and its failure never
//! rolls the commit back. A crash between commit and publish loses the
//! invalidation signal, which the short ranking TTL bounds (the documented
//! consistency gap, not fixed here).
use crate::model::{
    CacheInvalidate, Envelope, Event, Score, ScoreCreated, ScoreUpdated, SubmitOutcome,
    SubmitRequest,
};
use crate::store::{ScoreStore, StoreError};
use arcade_bus::Bus;
use arcade_cache::{CacheKey, CachePattern};
use std::sync::Arc;
use thiserror::Error;

/// Serialized metadata documents above this size are rejected up front.
const MAX_METADATA_BYTES: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ScoreService {
    store: Arc<dyn ScoreStore>,
    bus: Arc<Bus>,
}

impl ScoreService {
    pub fn new(store: Arc<dyn ScoreStore>, bus: Arc<Bus>) -> Self {
        Self { store, bus }
    }

    /// Validate and conditionally commit a submission, emitting events on
    /// acceptance. The returned outcome distinguishes created, updated, and
    /// not-updated; only the first two had side effects.
    pub async fn submit_score(
        &self,
        user_id: &str,
        username: &str,
        game: &str,
        score: i64,
        metadata: serde_json::Value,
    ) -> Result<SubmitOutcome, SubmitError> {
        let request = validate(user_id, username, game, score, metadata)?;

        let outcome = self.store.submit(&request).await?;
        match &outcome {
            SubmitOutcome::Created(record) => {
                metrics::counter!("arcade_scores_submitted_total", "outcome" => "created")
                    .increment(1);
                self.publish(Event::ScoreCreated(ScoreCreated {
                    score_id: record.id,
                    user_id: record.user_id.clone(),
                    username: record.username.clone(),
                    game: record.game.clone(),
                    score: record.score,
                }))
                .await;
                self.publish_invalidation(record).await;
            }
            SubmitOutcome::Updated { record, old_score } => {
                metrics::counter!("arcade_scores_submitted_total", "outcome" => "updated")
                    .increment(1);
                self.publish(Event::ScoreUpdated(ScoreUpdated {
                    score_id: record.id,
                    user_id: record.user_id.clone(),
                    username: record.username.clone(),
                    game: record.game.clone(),
                    old_score: *old_score,
                    new_score: record.score,
                }))
                .await;
                self.publish_invalidation(record).await;
            }
            SubmitOutcome::NotUpdated { current, attempted } => {
                metrics::counter!("arcade_scores_submitted_total", "outcome" => "rejected")
                    .increment(1);
                tracing::debug!(
                    user_id,
                    game,
                    current,
                    attempted,
                    "submission did not beat stored score"
                );
            }
        }
        Ok(outcome)
    }

    /// Publish one event envelope. Failures are logged and counted, never
    /// propagated: the score write has already committed.
    async fn publish(&self, event: Event) {
        let topic = event.topic();
        let envelope = Envelope::new(event);
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(topic, error = %err, "failed to encode event");
                metrics::counter!("arcade_publish_failures_total", "topic" => topic.to_string())
                    .increment(1);
                return;
            }
        };
        if let Err(err) = self.bus.publish(topic, payload).await {
            tracing::warn!(topic, error = %err, "event publish failed after committed write");
            metrics::counter!("arcade_publish_failures_total", "topic" => topic.to_string())
                .increment(1);
        } else {
            metrics::counter!("arcade_events_published_total", "topic" => topic.to_string())
                .increment(1);
        }
    }

    /// Name every cache entry a write to this record can stale:
    /// all ranking pages for the game and globally (patterns, since the limit
    /// dimension is open-ended) plus the exact stats keys.
    async fn publish_invalidation(&self, record: &Score) {
        self.publish(Event::CacheInvalidate(CacheInvalidate {
            keys: vec![
                CacheKey::game_stats(&record.game).into_string(),
                CacheKey::user_scores(&record.user_id).into_string(),
            ],
            patterns: vec![
                CachePattern::game_rankings(&record.game).as_str().to_string(),
                CachePattern::global_rankings().as_str().to_string(),
            ],
        }))
        .await;
    }
}

fn validate(
    user_id: &str,
    username: &str,
    game: &str,
    score: i64,
    metadata: serde_json::Value,
) -> Result<SubmitRequest, SubmitError> {
    if user_id.is_empty() {
        return Err(SubmitError::Validation("user id must not be empty".into()));
    }
    if username.is_empty() {
        return Err(SubmitError::Validation("username must not be empty".into()));
    }
    if game.trim().is_empty() {
        return Err(SubmitError::Validation("game must not be empty".into()));
    }
    if score < 0 {
        return Err(SubmitError::Validation(
            "score must be a non-negative integer".into(),
        ));
    }
    let metadata_len = serde_json::to_vec(&metadata)
        .map(|bytes| bytes.len())
        .unwrap_or(0);
    if metadata_len > MAX_METADATA_BYTES {
        return Err(SubmitError::Validation(format!(
            "metadata too large ({metadata_len} bytes, max {MAX_METADATA_BYTES})"
        )));
    }
    Ok(SubmitRequest {
        user_id: user_id.to_string(),
        username: username.to_string(),
        game: game.trim().to_string(),
        score,
        metadata,
    })
}
