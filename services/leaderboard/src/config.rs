use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DEFAULT_LIMIT: u32 = 50;
const DEFAULT_MAX_LIMIT: u32 = 100;
const DEFAULT_RANKING_TTL_SECS: u64 = 30;
const DEFAULT_USER_RANK_TTL_SECS: u64 = 60;
const DEFAULT_STATS_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_LISTENER_IDLE_MS: u64 = 1000;
const DEFAULT_LISTENER_BACKOFF_MS: u64 = 100;
const DEFAULT_LISTENER_BACKOFF_MAX_MS: u64 = 5000;
const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5000;

/// Which score store backs the service.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Memory,
    Postgres(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

// Leaderboard service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    // HTTP API bind address.
    pub bind_addr: SocketAddr,
    // Metrics HTTP listener bind address.
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    // Ranking page size applied when the query omits a limit.
    pub default_limit: u32,
    // Hard cap on the ranking page size.
    pub max_limit: u32,
    // Cache lifetime for ranking pages.
    pub ranking_ttl_secs: u64,
    // Cache lifetime for single-user rank lookups.
    pub user_rank_ttl_secs: u64,
    // Cache lifetime for aggregate game stats.
    pub stats_ttl_secs: u64,
    // Per-operation cache deadline before the read falls through.
    pub cache_op_timeout_ms: u64,
    // How long the invalidation listener waits for an event before
    // re-checking shutdown.
    pub listener_idle_ms: u64,
    // Initial retry delay after a failed invalidation.
    pub listener_backoff_ms: u64,
    // Retry delay ceiling.
    pub listener_backoff_max_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LeaderboardConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    database_url: Option<String>,
    pg_max_connections: Option<u32>,
    pg_acquire_timeout_ms: Option<u64>,
    default_limit: Option<u32>,
    max_limit: Option<u32>,
    ranking_ttl_secs: Option<u64>,
    user_rank_ttl_secs: Option<u64>,
    stats_ttl_secs: Option<u64>,
    cache_op_timeout_ms: Option<u64>,
    listener_idle_ms: Option<u64>,
    listener_backoff_ms: Option<u64>,
    listener_backoff_max_ms: Option<u64>,
}

impl LeaderboardConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("ARCADE_BIND")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .with_context(|| "parse ARCADE_BIND")?;
        let metrics_bind = std::env::var("ARCADE_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse ARCADE_METRICS_BIND")?;
        // Without a database URL the service runs on the in-memory store.
        let storage = match std::env::var("ARCADE_DATABASE_URL").ok() {
            Some(url) if !url.is_empty() => StorageBackend::Postgres(PostgresConfig {
                url,
                max_connections: std::env::var("ARCADE_PG_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|value| value.parse::<u32>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                acquire_timeout_ms: std::env::var("ARCADE_PG_ACQUIRE_TIMEOUT_MS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
            }),
            _ => StorageBackend::Memory,
        };
        let default_limit = std::env::var("ARCADE_DEFAULT_LIMIT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_DEFAULT_LIMIT);
        let max_limit = std::env::var("ARCADE_MAX_LIMIT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_LIMIT);
        let ranking_ttl_secs = std::env::var("ARCADE_RANKING_TTL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_RANKING_TTL_SECS);
        let user_rank_ttl_secs = std::env::var("ARCADE_USER_RANK_TTL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_USER_RANK_TTL_SECS);
        let stats_ttl_secs = std::env::var("ARCADE_STATS_TTL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_STATS_TTL_SECS);
        let cache_op_timeout_ms = std::env::var("ARCADE_CACHE_OP_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_CACHE_OP_TIMEOUT_MS);
        let listener_idle_ms = std::env::var("ARCADE_LISTENER_IDLE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_LISTENER_IDLE_MS);
        let listener_backoff_ms = std::env::var("ARCADE_LISTENER_BACKOFF_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_LISTENER_BACKOFF_MS);
        let listener_backoff_max_ms = std::env::var("ARCADE_LISTENER_BACKOFF_MAX_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_LISTENER_BACKOFF_MAX_MS);
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            default_limit,
            max_limit,
            ranking_ttl_secs,
            user_rank_ttl_secs,
            stats_ttl_secs,
            cache_op_timeout_ms,
            listener_idle_ms,
            listener_backoff_ms,
            listener_backoff_max_ms,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("ARCADE_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read ARCADE_CONFIG: {path}"))?;
            let override_cfg: LeaderboardConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse leaderboard config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(url) = override_cfg.database_url {
                let (max_connections, acquire_timeout_ms) = match &config.storage {
                    StorageBackend::Postgres(pg) => (pg.max_connections, pg.acquire_timeout_ms),
                    StorageBackend::Memory => {
                        (DEFAULT_PG_MAX_CONNECTIONS, DEFAULT_PG_ACQUIRE_TIMEOUT_MS)
                    }
                };
                config.storage = StorageBackend::Postgres(PostgresConfig {
                    url,
                    max_connections: override_cfg.pg_max_connections.unwrap_or(max_connections),
                    acquire_timeout_ms: override_cfg
                        .pg_acquire_timeout_ms
                        .unwrap_or(acquire_timeout_ms),
                });
            }
            if let Some(value) = override_cfg.default_limit {
                config.default_limit = value;
            }
            if let Some(value) = override_cfg.max_limit {
                config.max_limit = value;
            }
            if let Some(value) = override_cfg.ranking_ttl_secs {
                config.ranking_ttl_secs = value;
            }
            if let Some(value) = override_cfg.user_rank_ttl_secs {
                config.user_rank_ttl_secs = value;
            }
            if let Some(value) = override_cfg.stats_ttl_secs {
                config.stats_ttl_secs = value;
            }
            if let Some(value) = override_cfg.cache_op_timeout_ms {
                config.cache_op_timeout_ms = value;
            }
            if let Some(value) = override_cfg.listener_idle_ms {
                config.listener_idle_ms = value;
            }
            if let Some(value) = override_cfg.listener_backoff_ms {
                config.listener_backoff_ms = value;
            }
            if let Some(value) = override_cfg.listener_backoff_max_ms {
                config.listener_backoff_max_ms = value;
            }
        }
        Ok(config)
    }

    pub fn ranking_ttl(&self) -> Duration {
        Duration::from_secs(self.ranking_ttl_secs)
    }

    pub fn user_rank_ttl(&self) -> Duration {
        Duration::from_secs(self.user_rank_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_op_timeout_ms)
    }

    pub fn listener_idle(&self) -> Duration {
        Duration::from_millis(self.listener_idle_ms)
    }

    pub fn listener_backoff(&self) -> Duration {
        Duration::from_millis(self.listener_backoff_ms)
    }

    pub fn listener_backoff_max(&self) -> Duration {
        Duration::from_millis(self.listener_backoff_max_ms)
    }
}
