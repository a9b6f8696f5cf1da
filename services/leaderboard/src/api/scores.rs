//! Score submission and per-user score API handlers.
//!
//! # Purpose
//! The write endpoint for the pipeline plus the per-user score reads: the
//! cross-game listing and the single-game lookup.
//! A submission that loses to the stored score is a successful request with
//! `accepted: false`, never an HTTP error.
use crate::api::error::{ApiError, api_internal, api_not_found, api_validation_error};
use crate::api::types::{SubmitScoreRequest, SubmitScoreResponse, UserScoresResponse};
use crate::app::AppState;
use crate::auth::identity_from_headers;
use crate::ingest::SubmitError;
use crate::model::SubmitOutcome;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

#[utoipa::path(
    post,
    path = "/v1/scores",
    tag = "scores",
    request_body = SubmitScoreRequest,
    responses(
        (status = 201, description = "First score for this user and game", body = SubmitScoreResponse),
        (status = 200, description = "Score updated, or rejected as not higher", body = SubmitScoreResponse),
        (status = 400, description = "Invalid submission", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing identity headers", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn submit_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitScoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let metadata = body.metadata.unwrap_or_else(|| serde_json::json!({}));
    let outcome = state
        .scores
        .submit_score(
            &identity.user_id,
            &identity.username,
            &body.game,
            body.score,
            metadata,
        )
        .await
        .map_err(|err| match err {
            SubmitError::Validation(message) => api_validation_error(&message),
            SubmitError::Store(err) => api_internal("failed to submit score", &err),
        })?;

    let (status, response) = match outcome {
        SubmitOutcome::Created(record) => (
            StatusCode::CREATED,
            SubmitScoreResponse {
                accepted: true,
                message: "score recorded".to_string(),
                attempted_score: Some(record.score),
                current_score: Some(record.score),
                record: Some(record),
            },
        ),
        SubmitOutcome::Updated { record, old_score } => (
            StatusCode::OK,
            SubmitScoreResponse {
                accepted: true,
                message: format!("score improved from {old_score}"),
                attempted_score: Some(record.score),
                current_score: Some(record.score),
                record: Some(record),
            },
        ),
        SubmitOutcome::NotUpdated { current, attempted } => (
            StatusCode::OK,
            SubmitScoreResponse {
                accepted: false,
                message: "submitted score does not beat the current score".to_string(),
                record: None,
                current_score: Some(current),
                attempted_score: Some(attempted),
            },
        ),
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/scores",
    tag = "scores",
    params(
        ("user_id" = String, Path, description = "User identifier")
    ),
    responses(
        (status = 200, description = "All of the user's scores, best first", body = UserScoresResponse)
    )
)]
pub(crate) async fn user_scores(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserScoresResponse>, ApiError> {
    let items = state
        .rankings
        .user_scores(&user_id)
        .await
        .map_err(|err| api_internal("failed to list user scores", &err))?;
    Ok(Json(UserScoresResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/games/{game}/score",
    tag = "scores",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("game" = String, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "The user's score for this game", body = crate::model::Score),
        (status = 404, description = "No score recorded", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn user_game_score(
    Path((user_id, game)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<crate::model::Score>, ApiError> {
    let score = state
        .store
        .find_score(&user_id, &game)
        .await
        .map_err(|err| api_internal("failed to look up score", &err))?
        .ok_or_else(|| api_not_found("user has no score in this game"))?;
    Ok(Json(score))
}
