//! Cache configuration.
//!
//! Controls the backing store and the TTL/ceiling of both cache variants via the
//! `[cache]` section of `shardpress.toml`.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

const DEFAULT_ARTICLE_TTL_SECONDS: u64 = 3600;
const DEFAULT_COMMENT_TTL_SECONDS: u64 = 3600;
const DEFAULT_COMMENT_CEILING: usize = 30;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process LRU map. Entries do not survive restarts.
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    /// TTL applied to single-article entries.
    pub article_ttl: Duration,
    /// TTL applied to comment-collection entries.
    pub comment_ttl: Duration,
    /// Tracked comment collections above which the least recently used one is evicted.
    pub comment_ceiling: usize,
    /// Upper bound on entries held by the in-memory store.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            article_ttl: Duration::from_secs(DEFAULT_ARTICLE_TTL_SECONDS),
            comment_ttl: Duration::from_secs(DEFAULT_COMMENT_TTL_SECONDS),
            comment_ceiling: DEFAULT_COMMENT_CEILING,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            article_ttl: Duration::from_secs(settings.article_ttl_seconds.get()),
            comment_ttl: Duration::from_secs(settings.comment_ttl_seconds.get()),
            comment_ceiling: settings.comment_ceiling.get(),
            memory_capacity: settings.memory_capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
