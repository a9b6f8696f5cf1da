//! End-to-end pipeline tests: submit over HTTP, let the invalidation
//! listener drain the bus, and observe the ranking read converge.
mod common;
mod http_helpers;

use axum::body::Body;
use axum::http::StatusCode;
use common::read_json;
use http_helpers::{get_request, submit_request};
use leaderboard::api::types::FeatureFlags;
use leaderboard::app::{AppState, build_router};
use leaderboard::cache::CacheLayer;
use leaderboard::config::LeaderboardConfig;
use leaderboard::ingest::ScoreService;
use leaderboard::listener::{InvalidationListener, ListenerHandle};
use leaderboard::ranking::RankingService;
use arcade_cache::CacheBackend;
use leaderboard::store::{ScoreStore, memory::MemoryScoreStore};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Pipeline {
    app: axum::routing::RouterIntoService<Body, ()>,
    bus: Arc<arcade_bus::Bus>,
    backend: Arc<arcade_cache::MemoryCache>,
    listener: ListenerHandle,
}

fn pipeline() -> Pipeline {
    let config = LeaderboardConfig::from_env().expect("config");
    let store: Arc<dyn ScoreStore> = Arc::new(MemoryScoreStore::new());
    let bus = Arc::new(arcade_bus::Bus::new());
    let backend = Arc::new(arcade_cache::MemoryCache::new());
    let cache = CacheLayer::new(backend.clone(), Duration::from_millis(250));

    let listener = InvalidationListener::new(
        Arc::clone(&bus),
        cache.clone(),
        Duration::from_millis(20),
        Duration::from_millis(5),
        Duration::from_millis(40),
    )
    .spawn();

    let state = AppState {
        api_version: "v1".to_string(),
        features: FeatureFlags {
            durable_storage: store.is_durable(),
            cache_backend: cache.backend_name().to_string(),
        },
        scores: Arc::new(ScoreService::new(Arc::clone(&store), Arc::clone(&bus))),
        rankings: Arc::new(RankingService::new(Arc::clone(&store), cache, &config)),
        store,
    };
    Pipeline {
        app: build_router(state).into_service(),
        bus,
        backend,
        listener,
    }
}

/// Wait for the listener to consume every pending invalidation, so a cache
/// warmed afterwards is not evicted by a leftover event.
async fn drain_invalidations(pipeline: &Pipeline) {
    for _ in 0..200 {
        if pipeline
            .bus
            .depth(leaderboard::model::TOPIC_CACHE_INVALIDATE)
            .await
            == 0
        {
            tokio::time::sleep(Duration::from_millis(50)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("invalidation queue never drained");
}

async fn submit(pipeline: &Pipeline, user_id: &str, username: &str, game: &str, score: i64) {
    let req = submit_request(
        user_id,
        username,
        serde_json::json!({"game": game, "score": score}),
    );
    let response = pipeline.app.clone().oneshot(req).await.expect("submit");
    assert!(response.status() == StatusCode::OK || response.status() == StatusCode::CREATED);
}

async fn top_username(pipeline: &Pipeline, game: &str) -> String {
    let response = pipeline
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/rankings/games/{game}?limit=10")))
        .await
        .expect("ranking");
    let body = read_json(response).await;
    body["items"][0]["username"]
        .as_str()
        .expect("username")
        .to_string()
}

/// Poll until the ranking read reflects the expected leader, which requires
/// the listener to have applied the invalidation for the warmed page.
async fn wait_for_leader(pipeline: &Pipeline, game: &str, expected: &str) {
    for _ in 0..200 {
        if top_username(pipeline, game).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("ranking for {game} never showed {expected}");
}

#[tokio::test]
async fn submission_invalidates_warmed_ranking() {
    let pipeline = pipeline();
    submit(&pipeline, "u1", "alice", "doom", 100).await;

    // Warm the cache, then beat the score: the cached page must be evicted by
    // the listener, not waited out via TTL.
    assert_eq!(top_username(&pipeline, "doom").await, "alice");
    submit(&pipeline, "u2", "bob", "doom", 500).await;
    wait_for_leader(&pipeline, "doom", "bob").await;

    pipeline.listener.shutdown().await;
}

#[tokio::test]
async fn invalidation_is_scoped_to_the_submitted_game() {
    let pipeline = pipeline();
    submit(&pipeline, "u1", "alice", "doom", 100).await;
    submit(&pipeline, "u2", "bob", "wolf", 100).await;
    drain_invalidations(&pipeline).await;

    // Warm both game pages.
    top_username(&pipeline, "doom").await;
    top_username(&pipeline, "wolf").await;

    submit(&pipeline, "u3", "carol", "doom", 500).await;
    wait_for_leader(&pipeline, "doom", "carol").await;

    // The wolf page survived the doom invalidation.
    assert!(
        pipeline
            .backend
            .get("ranking:wolf:10")
            .await
            .expect("get")
            .is_some()
    );

    pipeline.listener.shutdown().await;
}

#[tokio::test]
async fn rejected_submission_leaves_cache_warm() {
    let pipeline = pipeline();
    submit(&pipeline, "u1", "alice", "doom", 500).await;
    drain_invalidations(&pipeline).await;
    top_username(&pipeline, "doom").await;

    submit(&pipeline, "u2", "bob", "doom", 100).await;
    // No acceptance, no invalidation: the warmed page stays.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        pipeline
            .backend
            .get("ranking:doom:10")
            .await
            .expect("get")
            .is_some()
    );

    pipeline.listener.shutdown().await;
}

#[tokio::test]
async fn user_score_list_is_cached_and_evicted_on_submission() {
    let pipeline = pipeline();
    submit(&pipeline, "u1", "alice", "doom", 100).await;
    drain_invalidations(&pipeline).await;

    // Reading the list populates its key.
    let response = pipeline
        .app
        .clone()
        .oneshot(get_request("/v1/users/u1/scores"))
        .await
        .expect("scores");
    let body = read_json(response).await;
    assert_eq!(body["items"].as_array().expect("items").len(), 1);
    assert!(
        pipeline
            .backend
            .get("stats:user:u1")
            .await
            .expect("get")
            .is_some()
    );

    // An accepted submission for the same user evicts it.
    submit(&pipeline, "u1", "alice", "wolf", 400).await;
    for _ in 0..200 {
        if pipeline
            .backend
            .get("stats:user:u1")
            .await
            .expect("get")
            .is_none()
        {
            pipeline.listener.shutdown().await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("user score list was never evicted");
}

#[tokio::test]
async fn stats_converge_after_submission() {
    let pipeline = pipeline();
    submit(&pipeline, "u1", "alice", "doom", 100).await;

    let response = pipeline
        .app
        .clone()
        .oneshot(get_request("/v1/stats/games/doom"))
        .await
        .expect("stats");
    let body = read_json(response).await;
    assert_eq!(body["total_players"], 1);

    submit(&pipeline, "u2", "bob", "doom", 300).await;
    for _ in 0..200 {
        let response = pipeline
            .app
            .clone()
            .oneshot(get_request("/v1/stats/games/doom"))
            .await
            .expect("stats");
        let body = read_json(response).await;
        if body["total_players"] == 2 && body["highest_score"] == 300 {
            pipeline.listener.shutdown().await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("stats never reflected the second submission");
}
