//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    error::DomainError,
    shard::ShardKey,
    types::{JobState, JobType},
};

/// Article row as stored in a shard.
///
/// `shard_key` always names the shard the row lives in. Rows in the global shard that were
/// replicated from a regional shard carry the `source` back-reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub author: String,
    pub title: String,
    pub content: String,
    pub shard_key: ShardKey,
    pub published_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub source: Option<SourceRef>,
}

impl ArticleRecord {
    /// Checks that the row's shard attribute names the shard it was read from.
    pub fn ensure_resides_in(&self, shard: ShardKey) -> Result<(), DomainError> {
        if self.shard_key != shard {
            return Err(DomainError::invariant(format!(
                "article `{}` carries shard `{}` but lives in `{}`",
                self.id, self.shard_key, shard
            )));
        }
        if self.source.is_some() && !shard.is_global() {
            return Err(DomainError::invariant(format!(
                "regional article `{}` must not carry a source reference",
                self.id
            )));
        }
        Ok(())
    }
}

/// Back-reference from a global projection to the row it was replicated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRef {
    pub shard_key: ShardKey,
    pub record_id: i64,
}

impl SourceRef {
    pub fn new(shard_key: ShardKey, record_id: i64) -> Self {
        Self {
            shard_key,
            record_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub article_id: i64,
    pub author: String,
    pub text: String,
    pub shard_key: ShardKey,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: OffsetDateTime,
    pub done_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

impl JobRecord {
    /// Killed outright, or failed with every delivery attempt spent.
    pub fn is_dead_letter(&self) -> bool {
        match self.state {
            JobState::Killed => true,
            JobState::Failed => self.attempts >= self.max_attempts,
            _ => false,
        }
    }
}
