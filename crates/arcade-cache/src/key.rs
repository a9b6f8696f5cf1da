//! Typed cache key construction.
//!
//! Keys follow the `<namespace>:<scope>:<variant>` layout. Building keys and
//! their invalidation patterns through the same constructors keeps the two from
//! drifting apart: a pattern produced here always covers the keys produced here
//! for the same scope.
use std::fmt;

const NS_RANKING: &str = "ranking";
const NS_STATS: &str = "stats";
const GLOBAL_SCOPE: &str = "global";

/// A fully-formed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// One page of a per-game ranking, keyed by the requested limit.
    pub fn game_ranking(game: &str, limit: u32) -> Self {
        Self(format!("{NS_RANKING}:{game}:{limit}"))
    }

    /// One page of the global ranking.
    pub fn global_ranking(limit: u32) -> Self {
        Self(format!("{NS_RANKING}:{GLOBAL_SCOPE}:{limit}"))
    }

    /// A single user's rank within a game.
    pub fn user_rank(game: &str, user_id: &str) -> Self {
        Self(format!("{NS_RANKING}:{game}:user:{user_id}"))
    }

    /// Aggregate statistics for a game.
    pub fn game_stats(game: &str) -> Self {
        Self(format!("{NS_STATS}:game:{game}"))
    }

    /// A user's score list across games.
    pub fn user_scores(user_id: &str) -> Self {
        Self(format!("{NS_STATS}:user:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A glob pattern covering a family of cache keys.
///
/// Only `*` wildcards are supported, matching any run of characters including
/// `:` separators, mirroring how key-space scans treat patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePattern(String);

impl CachePattern {
    /// Every ranking key for one game, regardless of limit or user dimension.
    pub fn game_rankings(game: &str) -> Self {
        Self(format!("{NS_RANKING}:{game}:*"))
    }

    /// Every global ranking page.
    pub fn global_rankings() -> Self {
        Self(format!("{NS_RANKING}:{GLOBAL_SCOPE}:*"))
    }

    /// Wrap a pattern string received over the wire (e.g. from an
    /// invalidation event). No validation beyond non-emptiness is applied;
    /// an empty pattern matches nothing.
    pub fn from_wire(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Glob match against a concrete key.
    pub fn matches(&self, key: &str) -> bool {
        glob_match(&self.0, key)
    }
}

impl fmt::Display for CachePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Iterative `*`-only glob matcher with single-star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < txt.len() {
        if p < pat.len() && (pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Let the last star absorb one more character and retry.
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_have_expected_shape() {
        assert_eq!(CacheKey::game_ranking("doom", 50).as_str(), "ranking:doom:50");
        assert_eq!(CacheKey::global_ranking(10).as_str(), "ranking:global:10");
        assert_eq!(CacheKey::user_rank("doom", "u1").as_str(), "ranking:doom:user:u1");
        assert_eq!(CacheKey::game_stats("doom").as_str(), "stats:game:doom");
        assert_eq!(CacheKey::user_scores("u1").as_str(), "stats:user:u1");
    }

    #[test]
    fn game_pattern_covers_all_game_ranking_keys() {
        let pattern = CachePattern::game_rankings("doom");
        assert!(pattern.matches(CacheKey::game_ranking("doom", 10).as_str()));
        assert!(pattern.matches(CacheKey::game_ranking("doom", 50).as_str()));
        assert!(pattern.matches(CacheKey::user_rank("doom", "u1").as_str()));
        assert!(!pattern.matches(CacheKey::game_ranking("wolf", 10).as_str()));
        assert!(!pattern.matches(CacheKey::global_ranking(10).as_str()));
        assert!(!pattern.matches(CacheKey::game_stats("doom").as_str()));
    }

    #[test]
    fn global_pattern_leaves_game_keys_alone() {
        let pattern = CachePattern::global_rankings();
        assert!(pattern.matches(CacheKey::global_ranking(50).as_str()));
        assert!(!pattern.matches(CacheKey::game_ranking("doom", 50).as_str()));
    }

    #[test]
    fn glob_matcher_handles_star_positions() {
        assert!(glob_match("ranking:*", "ranking:doom:50"));
        assert!(glob_match("*:50", "ranking:doom:50"));
        assert!(glob_match("ranking:*:50", "ranking:doom:50"));
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("", "x"));
        assert!(!glob_match("ranking:*", "stats:game:doom"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
    }
}
