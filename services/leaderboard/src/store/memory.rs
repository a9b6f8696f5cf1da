//! In-memory implementation of the score store.
//!
//! # Purpose
//! Implements [`ScoreStore`] entirely in memory with `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for local development and tests (no
//! external dependencies) and for deployments where durability is not
//! required.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: the write lock serializes submissions, so
//!   the strictly-higher-wins check and the history append are atomic with
//!   respect to concurrent submitters -- the same guarantee the Postgres
//!   backend gets from its row lock.
//!
//! # Performance characteristics
//! Ranking reads scan and sort the full map. That is acceptable for dev/test
//! workloads; the cache layer absorbs repeats in any case.
use super::{ScoreStore, StoreError, StoreResult};
use crate::model::{
    GameStats, LeaderboardRow, Score, ScoreHistoryEntry, SubmitOutcome, SubmitRequest, UserRank,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

pub struct MemoryScoreStore {
    /// Authoritative rows keyed by (user_id, game).
    scores: RwLock<HashMap<(String, String), Score>>,
    /// Append-only audit trail; only ever pushed to (or pruned on cascade).
    history: RwLock<Vec<ScoreHistoryEntry>>,
    next_score_id: AtomicI64,
    next_history_id: AtomicI64,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self {
            scores: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            next_score_id: AtomicI64::new(1),
            next_history_id: AtomicI64::new(1),
        }
    }

    fn ordered_rows(scores: &HashMap<(String, String), Score>, game: Option<&str>) -> Vec<Score> {
        let mut rows: Vec<Score> = scores
            .values()
            .filter(|score| game.is_none_or(|game| score.game == game))
            .cloned()
            .collect();
        // Authoritative ordering: score descending, earliest created_at wins ties.
        rows.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    fn to_row(score: &Score) -> LeaderboardRow {
        LeaderboardRow {
            user_id: score.user_id.clone(),
            username: score.username.clone(),
            game: score.game.clone(),
            score: score.score,
            created_at: score.created_at,
        }
    }
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn submit(&self, request: &SubmitRequest) -> StoreResult<SubmitOutcome> {
        // The write lock serializes the read-compare-write sequence, the same
        // isolation the durable backend gets from SELECT ... FOR UPDATE.
        let mut scores = self.scores.write().await;
        let key = (request.user_id.clone(), request.game.clone());
        let now = Utc::now();

        match scores.get_mut(&key) {
            None => {
                let record = Score {
                    id: self.next_score_id.fetch_add(1, Ordering::Relaxed),
                    user_id: request.user_id.clone(),
                    username: request.username.clone(),
                    game: request.game.clone(),
                    score: request.score,
                    metadata: request.metadata.clone(),
                    created_at: now,
                    updated_at: now,
                };
                scores.insert(key, record.clone());
                Ok(SubmitOutcome::Created(record))
            }
            Some(existing) if request.score > existing.score => {
                let old_score = existing.score;
                existing.score = request.score;
                existing.updated_at = now;
                let record = existing.clone();
                drop(scores);
                // History is skipped when old == new; with the lock held above
                // that cannot happen here, but the guard mirrors the contract.
                if old_score != request.score {
                    self.history.write().await.push(ScoreHistoryEntry {
                        id: self.next_history_id.fetch_add(1, Ordering::Relaxed),
                        score_id: record.id,
                        old_score,
                        new_score: request.score,
                        changed_at: now,
                    });
                }
                Ok(SubmitOutcome::Updated { record, old_score })
            }
            Some(existing) => Ok(SubmitOutcome::NotUpdated {
                current: existing.score,
                attempted: request.score,
            }),
        }
    }

    async fn find_score(&self, user_id: &str, game: &str) -> StoreResult<Option<Score>> {
        let scores = self.scores.read().await;
        Ok(scores
            .get(&(user_id.to_string(), game.to_string()))
            .cloned())
    }

    async fn game_ranking(&self, game: &str, limit: u32) -> StoreResult<Vec<LeaderboardRow>> {
        let scores = self.scores.read().await;
        Ok(Self::ordered_rows(&scores, Some(game))
            .iter()
            .take(limit as usize)
            .map(Self::to_row)
            .collect())
    }

    async fn global_ranking(&self, limit: u32) -> StoreResult<Vec<LeaderboardRow>> {
        let scores = self.scores.read().await;
        Ok(Self::ordered_rows(&scores, None)
            .iter()
            .take(limit as usize)
            .map(Self::to_row)
            .collect())
    }

    async fn user_rank(&self, game: &str, user_id: &str) -> StoreResult<Option<UserRank>> {
        let scores = self.scores.read().await;
        let ordered = Self::ordered_rows(&scores, Some(game));
        Ok(ordered
            .iter()
            .position(|score| score.user_id == user_id)
            .map(|index| UserRank {
                rank: index as u32 + 1,
                username: ordered[index].username.clone(),
                score: ordered[index].score,
            }))
    }

    async fn game_stats(&self, game: &str) -> StoreResult<GameStats> {
        let scores = self.scores.read().await;
        let values: Vec<i64> = scores
            .values()
            .filter(|score| score.game == game)
            .map(|score| score.score)
            .collect();
        if values.is_empty() {
            return Ok(GameStats {
                total_players: 0,
                highest_score: None,
                average_score: None,
                lowest_score: None,
            });
        }
        let total = values.len() as i64;
        let sum: i64 = values.iter().sum();
        Ok(GameStats {
            total_players: total,
            highest_score: values.iter().max().copied(),
            average_score: Some(sum as f64 / total as f64),
            lowest_score: values.iter().min().copied(),
        })
    }

    async fn user_scores(&self, user_id: &str) -> StoreResult<Vec<Score>> {
        let scores = self.scores.read().await;
        let mut rows: Vec<Score> = scores
            .values()
            .filter(|score| score.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(rows)
    }

    async fn score_history(&self, score_id: i64) -> StoreResult<Vec<ScoreHistoryEntry>> {
        let scores = self.scores.read().await;
        if !scores.values().any(|score| score.id == score_id) {
            return Err(StoreError::NotFound(format!("score {score_id}")));
        }
        drop(scores);
        let history = self.history.read().await;
        Ok(history
            .iter()
            .filter(|entry| entry.score_id == score_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
