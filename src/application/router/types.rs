use crate::domain::{entities::ArticleRecord, shard::ShardKey};

/// Result of a fan-out read. Articles keep per-shard order; shards are visited in key order.
#[derive(Debug, Clone, Default)]
pub struct RecentArticles {
    pub articles: Vec<ArticleRecord>,
    pub failed_shards: Vec<ShardFailure>,
}

impl RecentArticles {
    pub fn is_partial(&self) -> bool {
        !self.failed_shards.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
    pub shard: ShardKey,
    pub message: String,
}
