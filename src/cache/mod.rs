//! Cache-aside layer in front of the shards.
//!
//! - [`ArticleCache`]: single articles keyed by shard and id.
//! - [`CommentCache`]: comment listings, LRU-bounded through an access index.
//!
//! Both sit on a [`CacheStore`]; the in-process [`MemoryCacheStore`] is the default and
//! `infra::redis::RedisCacheStore` is used when `cache.backend = "redis"`.

mod articles;
mod comments;
mod config;
mod keys;
mod lock;
mod store;

pub use articles::ArticleCache;
pub use comments::CommentCache;
pub use config::{CacheBackend, CacheConfig};
pub use keys::CacheKey;
pub use store::{CacheStore, CacheStoreError, MemoryCacheStore};
