//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the leaderboard REST API and OpenAPI
//! schema generation.
use crate::model::{GameStats, RankedEntry, Score};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SubmitScoreRequest {
    pub game: String,
    pub score: i64,
    /// Opaque client document stored with the score (input device, level,
    /// etc.). Defaults to an empty object.
    pub metadata: Option<serde_json::Value>,
}

/// Outcome of a submission. `accepted` is false when the stored score was
/// already at least as high; that is a normal response, not an error.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SubmitScoreResponse {
    pub accepted: bool,
    pub message: String,
    pub record: Option<Score>,
    pub current_score: Option<i64>,
    pub attempted_score: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RankingResponse {
    pub items: Vec<RankedEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserRankResponse {
    pub game: String,
    pub user_id: String,
    pub rank: u32,
    pub username: String,
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameStatsResponse {
    pub game: String,
    #[serde(flatten)]
    pub stats: GameStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserScoresResponse {
    pub items: Vec<Score>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FeatureFlags {
    pub durable_storage: bool,
    pub cache_backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}
