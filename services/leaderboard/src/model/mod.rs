//! Leaderboard data model module.
//!
//! # Purpose
//! Re-exports the score/ranking domain types and the event payloads carried
//! on the bus between the ingestion path and its consumers.
mod event;
mod score;

pub use event::{
    CacheInvalidate, Envelope, Event, ScoreCreated, ScoreUpdated, TOPIC_CACHE_INVALIDATE,
    TOPIC_SCORE_CREATED, TOPIC_SCORE_UPDATED,
};
pub use score::{
    GameStats, LeaderboardRow, RankedEntry, Score, ScoreHistoryEntry, SubmitOutcome, SubmitRequest,
    UserRank,
};
