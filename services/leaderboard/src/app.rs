//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and
//! testable; integration tests drive the router directly.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::api::types::FeatureFlags;
use crate::ingest::ScoreService;
use crate::ranking::RankingService;
use crate::store::ScoreStore;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub features: FeatureFlags,
    pub scores: Arc<ScoreService>,
    pub rankings: Arc<RankingService>,
    pub store: Arc<dyn ScoreStore>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/v1/scores", axum::routing::post(api::scores::submit_score))
        .route(
            "/v1/rankings/global",
            axum::routing::get(api::rankings::global_ranking),
        )
        .route(
            "/v1/rankings/games/:game",
            axum::routing::get(api::rankings::game_ranking),
        )
        .route(
            "/v1/rankings/games/:game/users/:user_id",
            axum::routing::get(api::rankings::user_rank),
        )
        .route(
            "/v1/stats/games/:game",
            axum::routing::get(api::stats::game_stats),
        )
        .route(
            "/v1/users/:user_id/scores",
            axum::routing::get(api::scores::user_scores),
        )
        .route(
            "/v1/users/:user_id/games/:game/score",
            axum::routing::get(api::scores::user_game_score),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
