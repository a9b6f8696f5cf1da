//! Postgres-backed implementation of the score store.
//!
//! # What this module is
//! The durable, authoritative backend for `scores` and `score_history`,
//! implemented with `sqlx`. Reads serve the ranking path; the single write
//! path is the conditional strictly-higher-wins submission.
//!
//! # Key invariants
//! - At most one `scores` row per (user_id, game), enforced by a unique
//!   constraint.
//! - The stored score never decreases: the update transaction re-checks
//!   "strictly greater" under a row lock, so a losing concurrent submission
//!   becomes a no-op rather than a stale overwrite.
//! - `score_history` is append-only and written in the same transaction as
//!   the score update it records; it cascade-deletes with its parent row.
//!
//! # Concurrency model
//! `SELECT ... FOR UPDATE` serializes submissions per identity; submissions
//! for different identities do not contend. Create/create races on a brand-new
//! identity surface as a unique violation, which is retried once as an update.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!` so handlers can assume the
//!   schema exists; a migration failure fails startup.
//! - Pool limits and acquire timeouts are explicit: on the write path, failing
//!   fast and surfacing a retryable error beats hanging a request.
//! - Database URLs may contain credentials; they are never logged.
use super::{ScoreStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{
    GameStats, LeaderboardRow, Score, ScoreHistoryEntry, SubmitOutcome, SubmitRequest, UserRank,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

pub struct PostgresScoreStore {
    pool: PgPool,
}

/// Row shape for the `scores` authoritative table.
///
/// Kept separate from the domain `Score` so schema details stay localized to
/// this module.
#[derive(Debug, Clone, FromRow)]
struct DbScore {
    id: i64,
    user_id: String,
    username: String,
    game: String,
    score: i64,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbScore> for Score {
    fn from(row: DbScore) -> Self {
        Score {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            game: row.game,
            score: row.score,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbLeaderboardRow {
    user_id: String,
    username: String,
    game: String,
    score: i64,
    created_at: DateTime<Utc>,
}

impl From<DbLeaderboardRow> for LeaderboardRow {
    fn from(row: DbLeaderboardRow) -> Self {
        LeaderboardRow {
            user_id: row.user_id,
            username: row.username,
            game: row.game,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbHistoryEntry {
    id: i64,
    score_id: i64,
    old_score: i64,
    new_score: i64,
    changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbUserRank {
    rank: i64,
    username: String,
    score: i64,
}

#[derive(Debug, Clone, FromRow)]
struct DbGameStats {
    total_players: i64,
    highest_score: Option<i64>,
    average_score: Option<f64>,
    lowest_score: Option<i64>,
}

const SELECT_SCORE: &str = "SELECT id, user_id, username, game, score, metadata, created_at, updated_at FROM scores";

impl PostgresScoreStore {
    /// Connect to Postgres and run migrations.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        // Pool tuning: cap concurrent DB work and bound how long a request
        // waits for a connection. A hung pool must become a retryable error,
        // not a stalled submission.
        let connect_options =
            PgConnectOptions::from_str(&pg.url).map_err(|err| StoreError::Unexpected(err.into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(any(test, feature = "pg-tests"))]
    pub(crate) fn pool_for_tests(&self) -> &PgPool {
        &self.pool
    }

    async fn try_submit(&self, request: &SubmitRequest) -> StoreResult<Option<SubmitOutcome>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent submissions for this identity.
        let existing = sqlx::query_as::<_, (i64, i64)>(
            "SELECT id, score FROM scores WHERE user_id = $1 AND game = $2 FOR UPDATE",
        )
        .bind(&request.user_id)
        .bind(&request.game)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            None => {
                let inserted = sqlx::query_as::<_, DbScore>(
                    r#"INSERT INTO scores (user_id, username, game, score, metadata)
                       VALUES ($1, $2, $3, $4, $5)
                       RETURNING id, user_id, username, game, score, metadata, created_at, updated_at"#,
                )
                .bind(&request.user_id)
                .bind(&request.username)
                .bind(&request.game)
                .bind(request.score)
                .bind(&request.metadata)
                .fetch_one(&mut *tx)
                .await;
                match inserted {
                    Ok(row) => {
                        tx.commit().await?;
                        Ok(Some(SubmitOutcome::Created(row.into())))
                    }
                    Err(err) if is_unique_violation(&err) => {
                        // Lost a create/create race; the caller retries and
                        // will now see the row under the lock.
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Some((id, old_score)) if request.score > old_score => {
                let updated = sqlx::query_as::<_, DbScore>(
                    r#"UPDATE scores SET score = $2, updated_at = now() WHERE id = $1
                       RETURNING id, user_id, username, game, score, metadata, created_at, updated_at"#,
                )
                .bind(id)
                .bind(request.score)
                .fetch_one(&mut *tx)
                .await?;
                // History is skipped when old == new; the strictly-greater
                // check above makes that unreachable here, but the guard is
                // part of the contract.
                if old_score != request.score {
                    sqlx::query(
                        "INSERT INTO score_history (score_id, old_score, new_score) VALUES ($1, $2, $3)",
                    )
                    .bind(id)
                    .bind(old_score)
                    .bind(request.score)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
                Ok(Some(SubmitOutcome::Updated {
                    record: updated.into(),
                    old_score,
                }))
            }
            Some((_, current)) => {
                // Nothing written; dropping the transaction releases the lock.
                Ok(Some(SubmitOutcome::NotUpdated {
                    current,
                    attempted: request.score,
                }))
            }
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait]
impl ScoreStore for PostgresScoreStore {
    async fn submit(&self, request: &SubmitRequest) -> StoreResult<SubmitOutcome> {
        // At most one retry: a lost insert race means the row now exists, so
        // the second attempt takes the update path.
        for _ in 0..2 {
            if let Some(outcome) = self.try_submit(request).await? {
                return Ok(outcome);
            }
        }
        Err(StoreError::Unexpected(anyhow::anyhow!(
            "submission retry exhausted for user={} game={}",
            request.user_id,
            request.game
        )))
    }

    async fn find_score(&self, user_id: &str, game: &str) -> StoreResult<Option<Score>> {
        let row = sqlx::query_as::<_, DbScore>(&format!(
            "{SELECT_SCORE} WHERE user_id = $1 AND game = $2"
        ))
        .bind(user_id)
        .bind(game)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Score::from))
    }

    async fn game_ranking(&self, game: &str, limit: u32) -> StoreResult<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, DbLeaderboardRow>(
            r#"SELECT user_id, username, game, score, created_at
               FROM scores
               WHERE game = $1
               ORDER BY score DESC, created_at ASC, id ASC
               LIMIT $2"#,
        )
        .bind(game)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LeaderboardRow::from).collect())
    }

    async fn global_ranking(&self, limit: u32) -> StoreResult<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, DbLeaderboardRow>(
            r#"SELECT user_id, username, game, score, created_at
               FROM scores
               ORDER BY score DESC, created_at ASC, id ASC
               LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LeaderboardRow::from).collect())
    }

    async fn user_rank(&self, game: &str, user_id: &str) -> StoreResult<Option<UserRank>> {
        let row = sqlx::query_as::<_, DbUserRank>(
            r#"WITH ranked AS (
                   SELECT user_id, username, score,
                          ROW_NUMBER() OVER (ORDER BY score DESC, created_at ASC, id ASC) AS rank
                   FROM scores
                   WHERE game = $1
               )
               SELECT rank, username, score FROM ranked WHERE user_id = $2"#,
        )
        .bind(game)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| UserRank {
            rank: row.rank as u32,
            username: row.username,
            score: row.score,
        }))
    }

    async fn game_stats(&self, game: &str) -> StoreResult<GameStats> {
        let row = sqlx::query_as::<_, DbGameStats>(
            r#"SELECT COUNT(*) AS total_players,
                      MAX(score) AS highest_score,
                      AVG(score)::float8 AS average_score,
                      MIN(score) AS lowest_score
               FROM scores
               WHERE game = $1"#,
        )
        .bind(game)
        .fetch_one(&self.pool)
        .await?;
        Ok(GameStats {
            total_players: row.total_players,
            highest_score: row.highest_score,
            average_score: row.average_score,
            lowest_score: row.lowest_score,
        })
    }

    async fn user_scores(&self, user_id: &str) -> StoreResult<Vec<Score>> {
        let rows = sqlx::query_as::<_, DbScore>(&format!(
            "{SELECT_SCORE} WHERE user_id = $1 ORDER BY score DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Score::from).collect())
    }

    async fn score_history(&self, score_id: i64) -> StoreResult<Vec<ScoreHistoryEntry>> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scores WHERE id = $1")
            .bind(score_id)
            .fetch_one(&self.pool)
            .await?
            > 0;
        if !exists {
            return Err(StoreError::NotFound(format!("score {score_id}")));
        }
        let rows = sqlx::query_as::<_, DbHistoryEntry>(
            r#"SELECT id, score_id, old_score, new_score, changed_at
               FROM score_history
               WHERE score_id = $1
               ORDER BY id ASC"#,
        )
        .bind(score_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ScoreHistoryEntry {
                id: row.id,
                score_id: row.score_id,
                old_score: row.old_score,
                new_score: row.new_score,
                changed_at: row.changed_at,
            })
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
