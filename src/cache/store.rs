//! Cache store protocol and the in-process implementation.
//!
//! A store maps string keys to serialized values with a per-entry TTL. The Redis-backed
//! implementation lives in `infra::redis`.

use std::{sync::RwLock, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "shardpress::cache::store";

pub(crate) const METRIC_MEMORY_EVICT: &str = "shardpress_cache_memory_evict_total";

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store command failed: {0}")]
    Command(String),
}

impl CacheStoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// `GET` / `SET key value TTL` / `DEL` over serialized values.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    /// Unconditional overwrite.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheStoreError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process store with TTL expiry and a capacity-bound LRU.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, MemoryEntry>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of entries held, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheStoreError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                counter!(METRIC_MEMORY_EVICT).increment(1);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}
