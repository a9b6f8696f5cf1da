//! Ranking query engine.
//!
//! # Purpose
//! Cache-aside reads over the score store. Every query consults the cache
//! first; on a miss it runs the authoritative query, stores the result under
//! the typed key with the tier's TTL, and returns it. Cache trouble of any
//! kind degrades to an authoritative read, never to an error.
//!
//! # TTL tiers
//! Ranking pages churn fastest and get the shortest lifetime; per-user ranks
//! sit in the middle; aggregate stats drift slowly and live longest. The
//! invalidation listener usually evicts entries well before expiry; the TTL
//! bounds staleness when an invalidation is lost.
use crate::cache::CacheLayer;
use crate::config::LeaderboardConfig;
use crate::model::{GameStats, RankedEntry, Score, UserRank};
use crate::store::{ScoreStore, StoreResult};
use arcade_cache::CacheKey;
use std::sync::Arc;
use std::time::Duration;

pub struct RankingService {
    store: Arc<dyn ScoreStore>,
    cache: CacheLayer,
    default_limit: u32,
    max_limit: u32,
    ranking_ttl: Duration,
    user_rank_ttl: Duration,
    stats_ttl: Duration,
}

impl RankingService {
    pub fn new(store: Arc<dyn ScoreStore>, cache: CacheLayer, config: &LeaderboardConfig) -> Self {
        Self {
            store,
            cache,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            ranking_ttl: config.ranking_ttl(),
            user_rank_ttl: config.user_rank_ttl(),
            stats_ttl: config.stats_ttl(),
        }
    }

    /// Resolve the requested page size: the default when absent, clamped to
    /// the configured maximum, never zero.
    pub fn clamp_limit(&self, limit: Option<u32>) -> u32 {
        limit.unwrap_or(self.default_limit).min(self.max_limit).max(1)
    }

    pub async fn game_ranking(
        &self,
        game: &str,
        limit: Option<u32>,
    ) -> StoreResult<Vec<RankedEntry>> {
        let limit = self.clamp_limit(limit);
        let key = CacheKey::game_ranking(game, limit);
        if let Some(cached) = self.cache.get_json::<Vec<RankedEntry>>(&key).await {
            return Ok(cached);
        }
        let rows = self.store.game_ranking(game, limit).await?;
        let ranked = RankedEntry::from_rows(rows);
        self.cache.put_json(&key, &ranked, self.ranking_ttl).await;
        Ok(ranked)
    }

    pub async fn global_ranking(&self, limit: Option<u32>) -> StoreResult<Vec<RankedEntry>> {
        let limit = self.clamp_limit(limit);
        let key = CacheKey::global_ranking(limit);
        if let Some(cached) = self.cache.get_json::<Vec<RankedEntry>>(&key).await {
            return Ok(cached);
        }
        let rows = self.store.global_ranking(limit).await?;
        let ranked = RankedEntry::from_rows(rows);
        self.cache.put_json(&key, &ranked, self.ranking_ttl).await;
        Ok(ranked)
    }

    /// A user's rank within one game. Only present ranks are cached; an absent
    /// rank always goes to the store so a first submission shows up promptly.
    pub async fn user_rank(&self, game: &str, user_id: &str) -> StoreResult<Option<UserRank>> {
        let key = CacheKey::user_rank(game, user_id);
        if let Some(cached) = self.cache.get_json::<UserRank>(&key).await {
            return Ok(Some(cached));
        }
        let rank = self.store.user_rank(game, user_id).await?;
        if let Some(rank) = &rank {
            self.cache.put_json(&key, rank, self.user_rank_ttl).await;
        }
        Ok(rank)
    }

    pub async fn game_stats(&self, game: &str) -> StoreResult<GameStats> {
        let key = CacheKey::game_stats(game);
        if let Some(cached) = self.cache.get_json::<GameStats>(&key).await {
            return Ok(cached);
        }
        let stats = self.store.game_stats(game).await?;
        self.cache.put_json(&key, &stats, self.stats_ttl).await;
        Ok(stats)
    }

    /// All of a user's scores across games. Invalidated alongside the user's
    /// stats key whenever one of their submissions is accepted.
    pub async fn user_scores(&self, user_id: &str) -> StoreResult<Vec<Score>> {
        let key = CacheKey::user_scores(user_id);
        if let Some(cached) = self.cache.get_json::<Vec<Score>>(&key).await {
            return Ok(cached);
        }
        let scores = self.store.user_scores(user_id).await?;
        self.cache.put_json(&key, &scores, self.stats_ttl).await;
        Ok(scores)
    }
}
