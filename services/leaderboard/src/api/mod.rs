//! Leaderboard HTTP API module.
//!
//! # Purpose
//! Exposes the route handler modules, the shared error helpers, and the
//! OpenAPI document.
pub mod error;
pub mod openapi;
pub mod rankings;
pub mod scores;
pub mod stats;
pub mod system;
pub mod types;
