//! Game statistics API handler.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::GameStatsResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, State};

#[utoipa::path(
    get,
    path = "/v1/stats/games/{game}",
    tag = "stats",
    params(
        ("game" = String, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Aggregate stats; zero players for an unknown game", body = GameStatsResponse)
    )
)]
pub(crate) async fn game_stats(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GameStatsResponse>, ApiError> {
    let stats = state
        .rankings
        .game_stats(&game)
        .await
        .map_err(|err| api_internal("failed to load game stats", &err))?;
    Ok(Json(GameStatsResponse { game, stats }))
}
