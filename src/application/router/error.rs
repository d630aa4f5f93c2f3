use thiserror::Error;

use crate::{
    application::{moderation::GateError, repos::RepoError},
    domain::shard::{ShardKey, ShardKeyError},
};

/// Caller-facing failures of router operations.
///
/// Cache and publish failures never appear here; they are absorbed where they happen.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    UnknownShardKey(#[from] ShardKeyError),
    #[error("{entity} `{id}` not found in shard `{shard}`")]
    NotFound {
        entity: &'static str,
        shard: ShardKey,
        id: i64,
    },
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("content rejected by moderation")]
    ContentRejected,
    #[error("downstream dependency unavailable")]
    DownstreamUnavailable(#[source] GateError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl RouterError {
    pub fn not_found(entity: &'static str, shard: ShardKey, id: i64) -> Self {
        Self::NotFound { entity, shard, id }
    }

    /// Whether the same request may succeed when repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            RouterError::DownstreamUnavailable(_) => true,
            RouterError::Repo(RepoError::Timeout | RepoError::Persistence(_)) => true,
            _ => false,
        }
    }

    /// HTTP-equivalent status for an outer transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            RouterError::UnknownShardKey(_) | RouterError::EmptyField(_) => 400,
            RouterError::NotFound { .. } => 404,
            RouterError::ContentRejected => 422,
            RouterError::DownstreamUnavailable(_) => 503,
            RouterError::Repo(RepoError::NotFound) => 404,
            RouterError::Repo(RepoError::Duplicate { .. }) => 409,
            RouterError::Repo(RepoError::InvalidInput { .. }) => 400,
            RouterError::Repo(RepoError::Timeout) => 503,
            RouterError::Repo(RepoError::Integrity { .. } | RepoError::Persistence(_)) => 500,
        }
    }
}
