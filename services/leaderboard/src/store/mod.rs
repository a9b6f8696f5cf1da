//! Score store abstraction.
//!
//! # Purpose
//! The store owns the authoritative `scores` rows and their append-only
//! history. All mutation flows through [`ScoreStore::submit`], the conditional
//! strictly-higher-wins transaction; everything else is a read.
//!
//! Two backends implement the trait: Postgres (durable, production) and an
//! in-memory map (dev/tests). Both enforce identical semantics so tests over
//! the memory backend exercise the same contract the durable one honors.
use crate::model::{
    GameStats, LeaderboardRow, Score, ScoreHistoryEntry, SubmitOutcome, SubmitRequest, UserRank,
};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;
#[cfg(feature = "pg-tests")]
mod postgres_tests;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Conditionally apply a submission: insert when no row exists, update when
    /// strictly higher (appending one history entry), otherwise report the
    /// current score without writing.
    ///
    /// Concurrent submissions for one (user_id, game) identity are serialized;
    /// the highest submitted score wins regardless of arrival order.
    async fn submit(&self, request: &SubmitRequest) -> StoreResult<SubmitOutcome>;

    /// Current score row for an identity, if any.
    async fn find_score(&self, user_id: &str, game: &str) -> StoreResult<Option<Score>>;

    /// Top rows for one game: score descending, earlier `created_at` breaking
    /// ties (first to reach a score outranks a later arrival).
    async fn game_ranking(&self, game: &str, limit: u32) -> StoreResult<Vec<LeaderboardRow>>;

    /// Top rows across all games, same ordering.
    async fn global_ranking(&self, limit: u32) -> StoreResult<Vec<LeaderboardRow>>;

    /// A user's rank within one game, or `None` when the user has no score
    /// there. Rank counts rows that strictly outrank the user's row plus one,
    /// with the same tie-break as the ranking queries.
    async fn user_rank(&self, game: &str, user_id: &str) -> StoreResult<Option<UserRank>>;

    /// Aggregate stats for a game; zero players for an unknown game.
    async fn game_stats(&self, game: &str) -> StoreResult<GameStats>;

    /// All of a user's score rows, best first.
    async fn user_scores(&self, user_id: &str) -> StoreResult<Vec<Score>>;

    /// Audit-trail entries for one score row, oldest first.
    async fn score_history(&self, score_id: i64) -> StoreResult<Vec<ScoreHistoryEntry>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
