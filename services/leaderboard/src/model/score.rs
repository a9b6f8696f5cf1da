//! Score model definitions and ranking row shapes.
//!
//! # Purpose
//! Defines the authoritative score record, its audit-trail entry, and the
//! derived rows returned by ranking queries. One `Score` exists per
//! (user_id, game) identity; the stored value only ever increases.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Authoritative best score for one (user, game) identity.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Score {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub score: i64,
    /// Opaque client document stored as-is (input device, level, etc.).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record of an accepted score change.
///
/// Written exactly once per accepted update, never mutated, and not read by
/// the ranking path.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ScoreHistoryEntry {
    pub id: i64,
    pub score_id: i64,
    pub old_score: i64,
    pub new_score: i64,
    pub changed_at: DateTime<Utc>,
}

/// Validated submission handed to the store's conditional upsert.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub score: i64,
    pub metadata: serde_json::Value,
}

/// Result of the conditional score-update transaction.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// No score existed for the identity; a new row was inserted.
    Created(Score),
    /// The submission was strictly higher; the row was updated and a history
    /// entry appended.
    Updated { record: Score, old_score: i64 },
    /// The submission did not beat the stored score; nothing was written.
    NotUpdated { current: i64, attempted: i64 },
}

impl SubmitOutcome {
    pub fn accepted(&self) -> bool {
        !matches!(self, SubmitOutcome::NotUpdated { .. })
    }
}

/// One row of an authoritative ranking query, before positions are assigned.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// A ranking row with its 1-based position attached.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RankedEntry {
    pub position: u32,
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

impl RankedEntry {
    /// Assign 1-based positions to rows already in authoritative order.
    pub fn from_rows(rows: Vec<LeaderboardRow>) -> Vec<Self> {
        rows.into_iter()
            .enumerate()
            .map(|(index, row)| RankedEntry {
                position: index as u32 + 1,
                user_id: row.user_id,
                username: row.username,
                game: row.game,
                score: row.score,
                created_at: row.created_at,
            })
            .collect()
    }
}

/// A single user's rank within one game.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserRank {
    pub rank: u32,
    pub username: String,
    pub score: i64,
}

/// Aggregate statistics for one game.
///
/// The aggregates are `None` for a game with no submissions; `total_players`
/// is zero rather than an error in that case.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct GameStats {
    pub total_players: i64,
    pub highest_score: Option<i64>,
    pub average_score: Option<f64>,
    pub lowest_score: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_one_based_and_ordered() {
        let rows = vec![
            LeaderboardRow {
                user_id: "a".into(),
                username: "alice".into(),
                game: "doom".into(),
                score: 300,
                created_at: Utc::now(),
            },
            LeaderboardRow {
                user_id: "b".into(),
                username: "bob".into(),
                game: "doom".into(),
                score: 200,
                created_at: Utc::now(),
            },
        ];
        let ranked = RankedEntry::from_rows(rows);
        assert_eq!(ranked[0].position, 1);
        assert_eq!(ranked[1].position, 2);
        assert_eq!(ranked[0].username, "alice");
    }

    #[test]
    fn not_updated_is_not_accepted() {
        let outcome = SubmitOutcome::NotUpdated {
            current: 100,
            attempted: 80,
        };
        assert!(!outcome.accepted());
    }
}
