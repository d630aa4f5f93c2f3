//! LRU-bounded cache of comment listings.
//!
//! Entries expire through the store TTL like any other entry. On top of that an access index
//! (cache key to last-access stamp) caps how many listings are tracked: once it holds more than
//! the ceiling, the stalest listing is removed from both the index and the store.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::domain::{dto::CommentDto, shard::ShardKey};

use super::{
    articles::{METRIC_CACHE_DEGRADED, METRIC_CACHE_HIT, METRIC_CACHE_MISS},
    config::CacheConfig,
    keys::CacheKey,
    store::CacheStore,
};

const SOURCE: &str = "shardpress::cache::comments";

pub(crate) const METRIC_CACHE_EVICT: &str = "shardpress_cache_evict_total";

const VARIANT: &str = "comment";

pub struct CommentCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    ceiling: usize,
    access: DashMap<String, u64>,
    // Monotonic stamps order touches even within the same clock tick.
    clock: AtomicU64,
}

impl CommentCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.comment_ttl,
            ceiling: config.comment_ceiling.max(1),
            access: DashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    /// Cached listing. A hit refreshes the access stamp but not the TTL.
    pub async fn get(&self, shard: ShardKey, article_id: i64) -> Option<Vec<CommentDto>> {
        let key = CacheKey::comments(shard, article_id).to_string();
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

        match serde_json::from_str::<Vec<CommentDto>>(&raw) {
            Ok(comments) => {
                counter!(METRIC_CACHE_HIT, "cache" => VARIANT).increment(1);
                self.touch(&key);
                Some(comments)
            }
            Err(err) => {
                warn!(target = SOURCE, key = %key, error = %err, "discarding undecodable comment listing");
                counter!(METRIC_CACHE_MISS, "cache" => VARIANT).increment(1);
                None
            }
        }
    }

    /// Overwrites the listing, stamps it, then evicts at most one stale listing.
    pub async fn set(&self, shard: ShardKey, article_id: i64, comments: &[CommentDto]) {
        let key = CacheKey::comments(shard, article_id).to_string();
        let value = match serde_json::to_string(comments) {
            Ok(value) => value,
            Err(err) => {
                warn!(target = SOURCE, key = %key, error = %err, "failed to serialize comments");
                return;
            }
        };

        if let Err(err) = self.store.set(&key, value, self.ttl).await {
            degraded("set", &key, &err);
            return;
        }

        self.touch(&key);
        self.evict_if_needed().await;
    }

    /// Drops the listing from the index and the store. Removing an absent key is a no-op.
    pub async fn remove(&self, shard: ShardKey, article_id: i64) {
        let key = CacheKey::comments(shard, article_id).to_string();
        self.access.remove(&key);
        if let Err(err) = self.store.delete(&key).await {
            degraded("remove", &key, &err);
        }
    }

    /// Removes the single least recently touched listing when the index is over the ceiling.
    ///
    /// The scan reads a snapshot of the index; two concurrent calls may each evict one entry.
    pub async fn evict_if_needed(&self) {
        if self.access.len() <= self.ceiling {
            return;
        }

        let oldest = self
            .access
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| entry.key().clone());
        let Some(oldest) = oldest else {
            return;
        };

        self.access.remove(&oldest);
        if let Err(err) = self.store.delete(&oldest).await {
            degraded("evict", &oldest, &err);
        }
        counter!(METRIC_CACHE_EVICT, "cache" => VARIANT).increment(1);
        info!(target = SOURCE, key = %oldest, "evicted least recently used comment listing");
    }

    /// Number of listings currently tracked by the access index.
    pub fn tracked(&self) -> usize {
        self.access.len()
    }

    pub fn is_tracked(&self, shard: ShardKey, article_id: i64) -> bool {
        self.access
            .contains_key(&CacheKey::comments(shard, article_id).to_string())
    }

    fn touch(&self, key: &str) {
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);
        self.access.insert(key.to_string(), stamp);
        debug!(target = SOURCE, key, stamp, "touched comment listing");
    }
}

fn degraded(op: &'static str, key: &str, err: &dyn std::error::Error) {
    counter!(METRIC_CACHE_DEGRADED, "cache" => VARIANT, "op" => op).increment(1);
    warn!(target = SOURCE, op, key, error = %err, "cache store unavailable; continuing without cache");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCacheStore;
    use time::macros::datetime;

    fn comment(article_id: i64) -> CommentDto {
        CommentDto {
            id: 1,
            article_id,
            author: "ana".into(),
            text: "nice".into(),
            shard_key: ShardKey::Asia,
            created_at: datetime!(2026-02-01 10:00 UTC),
        }
    }

    fn cache(ceiling: usize) -> CommentCache {
        let config = CacheConfig {
            comment_ceiling: ceiling,
            ..Default::default()
        };
        CommentCache::new(Arc::new(MemoryCacheStore::new(&config)), &config)
    }

    #[tokio::test]
    async fn hit_refreshes_recency() {
        let cache = cache(2);
        cache.set(ShardKey::Asia, 1, &[comment(1)]).await;
        cache.set(ShardKey::Asia, 2, &[comment(2)]).await;
        assert!(cache.get(ShardKey::Asia, 1).await.is_some());

        cache.set(ShardKey::Asia, 3, &[comment(3)]).await;

        assert_eq!(cache.tracked(), 2);
        assert!(cache.is_tracked(ShardKey::Asia, 1));
        assert!(!cache.is_tracked(ShardKey::Asia, 2));
        assert!(cache.get(ShardKey::Asia, 2).await.is_none());
    }

    #[tokio::test]
    async fn remove_clears_index_and_store() {
        let cache = cache(30);
        cache.set(ShardKey::Asia, 5, &[comment(5)]).await;

        cache.remove(ShardKey::Asia, 5).await;
        cache.remove(ShardKey::Asia, 5).await;

        assert!(!cache.is_tracked(ShardKey::Asia, 5));
        assert!(cache.get(ShardKey::Asia, 5).await.is_none());
    }

    #[tokio::test]
    async fn miss_does_not_track() {
        let cache = cache(30);
        assert!(cache.get(ShardKey::Asia, 8).await.is_none());
        assert_eq!(cache.tracked(), 0);
    }
}
