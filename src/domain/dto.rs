//! Wire contracts shared by the cache and the replication queue.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{
    entities::{ArticleRecord, CommentRecord},
    shard::ShardKey,
};

/// Serialized article as cached and as carried inside replication events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDto {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub shard_key: ShardKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_shard_key: Option<ShardKey>,
    #[serde(default)]
    pub trace_id: String,
}

impl ArticleDto {
    pub fn from_record(record: &ArticleRecord, trace_id: impl Into<String>) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            author: record.author.clone(),
            published_at: record.published_at,
            shard_key: record.shard_key,
            source_record_id: record.source.map(|source| source.record_id),
            source_shard_key: record.source.map(|source| source.shard_key),
            trace_id: trace_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i64,
    pub article_id: i64,
    pub author: String,
    pub text: String,
    pub shard_key: ShardKey,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&CommentRecord> for CommentDto {
    fn from(record: &CommentRecord) -> Self {
        Self {
            id: record.id,
            article_id: record.article_id,
            author: record.author.clone(),
            text: record.text.clone(),
            shard_key: record.shard_key,
            created_at: record.created_at,
        }
    }
}

/// Event emitted after a regional commit; consumed into the global shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationEvent {
    pub shard_key: ShardKey,
    pub record: ArticleDto,
    pub trace_id: String,
}
