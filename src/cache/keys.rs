//! Cache key definitions.

use std::fmt;

use crate::domain::shard::ShardKey;

/// Composite key of every cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single article in the shard it lives in.
    Article { shard: ShardKey, id: i64 },
    /// The comment listing of one article.
    Comments { shard: ShardKey, article_id: i64 },
}

impl CacheKey {
    pub fn article(shard: ShardKey, id: i64) -> Self {
        Self::Article { shard, id }
    }

    pub fn comments(shard: ShardKey, article_id: i64) -> Self {
        Self::Comments { shard, article_id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Article { shard, id } => write!(f, "article:{shard}:{id}"),
            CacheKey::Comments { shard, article_id } => write!(f, "comment:{shard}:{article_id}"),
        }
    }
}
