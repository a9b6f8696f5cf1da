//! Ranking API handlers.
//!
//! # Purpose
//! Read endpoints over the cache-aside ranking engine. All of them degrade to
//! authoritative store reads when the cache misbehaves; callers never see a
//! cache failure.
use crate::api::error::{ApiError, api_internal, api_not_found, api_validation_error};
use crate::api::types::{RankingResponse, UserRankResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use std::collections::HashMap;

/// Parse an optional `limit` query parameter; a malformed value is a 400
/// rather than a silent fallback to the default.
fn parse_limit(params: &HashMap<String, String>) -> Result<Option<u32>, ApiError> {
    match params.get("limit") {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| api_validation_error("limit must be a non-negative integer")),
    }
}

#[utoipa::path(
    get,
    path = "/v1/rankings/global",
    tag = "rankings",
    params(
        ("limit" = Option<u32>, Query, description = "Page size, clamped server-side")
    ),
    responses(
        (status = 200, description = "Global top scores across all games", body = RankingResponse)
    )
)]
pub(crate) async fn global_ranking(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<RankingResponse>, ApiError> {
    let limit = parse_limit(&params)?;
    let items = state
        .rankings
        .global_ranking(limit)
        .await
        .map_err(|err| api_internal("failed to load global ranking", &err))?;
    Ok(Json(RankingResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/rankings/games/{game}",
    tag = "rankings",
    params(
        ("game" = String, Path, description = "Game identifier"),
        ("limit" = Option<u32>, Query, description = "Page size, clamped server-side")
    ),
    responses(
        (status = 200, description = "Top scores for one game", body = RankingResponse)
    )
)]
pub(crate) async fn game_ranking(
    Path(game): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<RankingResponse>, ApiError> {
    let limit = parse_limit(&params)?;
    let items = state
        .rankings
        .game_ranking(&game, limit)
        .await
        .map_err(|err| api_internal("failed to load game ranking", &err))?;
    Ok(Json(RankingResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/rankings/games/{game}/users/{user_id}",
    tag = "rankings",
    params(
        ("game" = String, Path, description = "Game identifier"),
        ("user_id" = String, Path, description = "User identifier")
    ),
    responses(
        (status = 200, description = "The user's rank within the game", body = UserRankResponse),
        (status = 404, description = "User has no score in this game", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn user_rank(
    Path((game, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<UserRankResponse>, ApiError> {
    let rank = state
        .rankings
        .user_rank(&game, &user_id)
        .await
        .map_err(|err| api_internal("failed to load user rank", &err))?
        .ok_or_else(|| api_not_found("user has no score in this game"))?;
    Ok(Json(UserRankResponse {
        game,
        user_id,
        rank: rank.rank,
        username: rank.username,
        score: rank.score,
    }))
}
