//! Leaderboard service library crate.
//!
//! # Purpose
//! Exposes the score submission pipeline, ranking query engine, cache
//! invalidation listener, configuration, and storage implementations for use
//! by the binary and tests.
//!
//! # Notes
//! Module boundaries mirror the pipeline stages: ingest writes, ranking
//! reads, listener keeps the cache honest.
pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod listener;
pub mod model;
pub mod observability;
pub mod ranking;
pub mod store;
