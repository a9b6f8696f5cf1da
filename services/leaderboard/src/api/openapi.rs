//! OpenAPI schema aggregation for the leaderboard API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    rankings, scores, stats, system,
    types::{
        ErrorResponse, FeatureFlags, GameStatsResponse, HealthStatus, RankingResponse,
        SubmitScoreRequest, SubmitScoreResponse, SystemInfo, UserRankResponse, UserScoresResponse,
    },
};
use crate::model::{GameStats, RankedEntry, Score, ScoreHistoryEntry};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "arcade-leaderboard",
        version = "v1",
        description = "Score submission and ranking API"
    ),
    paths(
        system::system_info,
        system::system_health,
        scores::submit_score,
        scores::user_scores,
        scores::user_game_score,
        rankings::global_ranking,
        rankings::game_ranking,
        rankings::user_rank,
        stats::game_stats
    ),
    components(schemas(
        SubmitScoreRequest,
        SubmitScoreResponse,
        RankingResponse,
        UserRankResponse,
        GameStatsResponse,
        UserScoresResponse,
        FeatureFlags,
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        Score,
        ScoreHistoryEntry,
        RankedEntry,
        GameStats
    ))
)]
pub struct ApiDoc;
