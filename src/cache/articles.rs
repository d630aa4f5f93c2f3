//! Cache-aside entries for single articles.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use tracing::{debug, warn};

use crate::domain::{dto::ArticleDto, shard::ShardKey};

use super::{
    config::CacheConfig,
    keys::CacheKey,
    store::CacheStore,
};

const SOURCE: &str = "shardpress::cache::articles";

pub(crate) const METRIC_CACHE_HIT: &str = "shardpress_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "shardpress_cache_miss_total";
pub(crate) const METRIC_CACHE_DEGRADED: &str = "shardpress_cache_degraded_total";

const VARIANT: &str = "article";

/// Article cache over any [`CacheStore`]. Store failures never reach the caller.
pub struct ArticleCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ArticleCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.article_ttl,
        }
    }

    /// Cached article, or `None` on miss, undecodable payload, or store failure.
    pub async fn get(&self, shard: ShardKey, id: i64) -> Option<ArticleDto> {
        let key = CacheKey::article(shard, id).to_string();
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            Err(err) => {
                degraded("get", &key, &err);
                return None;
            }
        };

        let Some(raw) = raw else {
            counter!(METRIC_CACHE_MISS, "cache" => VARIANT).increment(1);
            return None;
        };

        match serde_json::from_str::<ArticleDto>(&raw) {
            Ok(dto) => {
                counter!(METRIC_CACHE_HIT, "cache" => VARIANT).increment(1);
                debug!(target = SOURCE, key = %key, "article cache hit");
                Some(dto)
            }
            Err(err) => {
                warn!(target = SOURCE, key = %key, error = %err, "discarding undecodable cache entry");
                counter!(METRIC_CACHE_MISS, "cache" => VARIANT).increment(1);
                None
            }
        }
    }

    /// Writes the DTO under its own shard and id. Returns whether the store accepted it.
    pub async fn set(&self, dto: &ArticleDto) -> bool {
        let key = CacheKey::article(dto.shard_key, dto.id).to_string();
        let value = match serde_json::to_string(dto) {
            Ok(value) => value,
            Err(err) => {
                warn!(target = SOURCE, key = %key, error = %err, "failed to serialize article");
                return false;
            }
        };

        match self.store.set(&key, value, self.ttl).await {
            Ok(()) => true,
            Err(err) => {
                degraded("set", &key, &err);
                false
            }
        }
    }

    pub async fn remove(&self, shard: ShardKey, id: i64) {
        let key = CacheKey::article(shard, id).to_string();
        if let Err(err) = self.store.delete(&key).await {
            degraded("remove", &key, &err);
        }
    }
}

fn degraded(op: &'static str, key: &str, err: &dyn std::error::Error) {
    counter!(METRIC_CACHE_DEGRADED, "cache" => VARIANT, "op" => op).increment(1);
    warn!(target = SOURCE, op, key, error = %err, "cache store unavailable; continuing without cache");
}
