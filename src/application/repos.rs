//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{ArticleRecord, CommentRecord, JobRecord, SourceRef};
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub author: String,
    pub title: String,
    pub content: String,
    /// Defaults to the commit time when absent.
    pub published_at: Option<OffsetDateTime>,
}

/// Full replacement of the editable article fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleChanges {
    pub author: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub article_id: i64,
    pub author: String,
    pub text: String,
}

/// Row written into the global shard for a replicated article.
#[derive(Debug, Clone)]
pub struct ReplicateArticleParams {
    pub source: SourceRef,
    pub author: String,
    pub title: String,
    pub content: String,
    pub published_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn find_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError>;

    async fn create_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Returns `None` when no row carries `id`.
    async fn update_article(
        &self,
        id: i64,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError>;

    /// Returns the deleted row, or `None` when it did not exist.
    async fn delete_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError>;

    /// Articles with `published_at >= since`, ordered by `published_at` then id.
    async fn list_published_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_comments(&self, article_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

/// Everything the router needs from a single shard.
pub trait ShardStore: ArticlesRepo + CommentsRepo {}

impl<T> ShardStore for T where T: ArticlesRepo + CommentsRepo {}

/// Global-shard projections keyed by their source back-reference.
#[async_trait]
pub trait ProjectionsRepo: Send + Sync {
    /// Inserts the projection unless the source pair already has one, and returns the stored
    /// row either way. An existing projection is never overwritten.
    async fn insert_projection(
        &self,
        params: ReplicateArticleParams,
    ) -> Result<ArticleRecord, RepoError>;

    async fn update_projection(
        &self,
        source: &SourceRef,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError>;

    async fn delete_projection(&self, source: &SourceRef)
    -> Result<Option<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;

    /// Jobs that will not be redelivered: killed, or failed with attempts exhausted.
    async fn list_dead_letters(
        &self,
        job_type: JobType,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError>;
}
