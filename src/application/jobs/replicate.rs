//! Replication of regional articles into the global shard.
//!
//! The producer enqueues a [`ReplicationEvent`] onto the durable `replicate_article` queue
//! right after a regional commit. The worker decodes it and inserts the projection unless one
//! already exists; a failed commit fails the job so the queue redelivers it, up to the job's
//! `max_attempts`. Once a projection exists only router updates and deletes change it, so a late
//! redelivery never rolls an edit back.

use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        repos::{JobsRepo, ProjectionsRepo, ReplicateArticleParams, RepoError},
        shards::ShardRegistry,
    },
    cache::ArticleCache,
    domain::{dto::ReplicationEvent, entities::SourceRef, shard::ShardKey, types::JobType},
};

use super::{
    context::{ReplicationContext, job_failed},
    queue::enqueue_job,
};

const SOURCE: &str = "shardpress::application::jobs::replicate";

pub(crate) const METRIC_PUBLISHED: &str = "shardpress_replication_published_total";
pub(crate) const METRIC_PUBLISH_FAILED: &str = "shardpress_replication_publish_failed_total";
pub(crate) const METRIC_COMMITTED: &str = "shardpress_replication_committed_total";
pub(crate) const METRIC_REQUEUED: &str = "shardpress_replication_requeued_total";
pub(crate) const METRIC_DROPPED: &str = "shardpress_replication_dropped_total";

const REPLICATION_PRIORITY: i32 = 10;

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("failed to publish replication event")]
    PublishFailed(#[source] RepoError),
    #[error("failed to read source article `{record_id}` from `{shard}`")]
    SourceUnavailable {
        shard: ShardKey,
        record_id: i64,
        #[source]
        source: RepoError,
    },
    #[error("failed to commit replicated article from `{shard}` record `{record_id}`")]
    CommitFailed {
        shard: ShardKey,
        record_id: i64,
        #[source]
        source: RepoError,
    },
}

/// Raw queue payload. Kept as untyped JSON so malformed messages reach the worker and can be
/// dropped instead of failing inside the queue backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicateArticleJob(pub serde_json::Value);

/// Outcome of a delivery that should be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Committed { global_id: i64 },
    Dropped { reason: String },
}

pub struct ReplicationPublisher {
    jobs: Arc<dyn JobsRepo>,
    max_attempts: i32,
}

impl ReplicationPublisher {
    pub fn new(jobs: Arc<dyn JobsRepo>, max_attempts: u32) -> Self {
        Self {
            jobs,
            max_attempts: i32::try_from(max_attempts).unwrap_or(i32::MAX),
        }
    }

    pub async fn publish(&self, event: &ReplicationEvent) -> Result<String, ReplicationError> {
        enqueue_job(
            self.jobs.as_ref(),
            JobType::ReplicateArticle,
            event,
            None,
            self.max_attempts,
            REPLICATION_PRIORITY,
        )
        .await
        .map_err(ReplicationError::PublishFailed)
    }

    /// Publishes and logs the failure instead of returning it.
    pub async fn publish_best_effort(&self, event: &ReplicationEvent) -> Option<String> {
        match self.publish(event).await {
            Ok(job_id) => {
                counter!(METRIC_PUBLISHED).increment(1);
                info!(
                    target = SOURCE,
                    job_id = %job_id,
                    shard = %event.shard_key,
                    record_id = event.record.id,
                    trace_id = %event.trace_id,
                    "replication event published"
                );
                Some(job_id)
            }
            Err(err) => {
                counter!(METRIC_PUBLISH_FAILED).increment(1);
                warn!(
                    target = SOURCE,
                    shard = %event.shard_key,
                    record_id = event.record.id,
                    trace_id = %event.trace_id,
                    error = %err,
                    "replication publish failed; article stays regional until refreshed"
                );
                None
            }
        }
    }
}

pub struct ReplicationConsumer {
    projections: Arc<dyn ProjectionsRepo>,
    sources: Option<Arc<ShardRegistry>>,
    cache: Option<Arc<ArticleCache>>,
}

impl ReplicationConsumer {
    pub fn new(projections: Arc<dyn ProjectionsRepo>) -> Self {
        Self {
            projections,
            sources: None,
            cache: None,
        }
    }

    /// Re-reads each event's source row before projecting it. Events whose source is gone
    /// are dropped, and the current row wins over the payload.
    pub fn with_sources_opt(mut self, sources: Option<Arc<ShardRegistry>>) -> Self {
        self.sources = sources;
        self
    }

    /// Drops stale cached copies of projections this consumer rewrites.
    pub fn with_cache_opt(mut self, cache: Option<Arc<ArticleCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Applies one delivery. `Ok` means acknowledge; `Err` means redeliver.
    pub async fn apply(&self, job: &ReplicateArticleJob) -> Result<Delivery, ReplicationError> {
        if job.0.is_null() {
            return Ok(Delivery::Dropped {
                reason: "null payload".to_string(),
            });
        }

        let event = match serde_json::from_value::<ReplicationEvent>(job.0.clone()) {
            Ok(event) => event,
            Err(err) => {
                return Ok(Delivery::Dropped {
                    reason: format!("undecodable payload: {err}"),
                });
            }
        };

        if event.shard_key.is_global() {
            return Ok(Delivery::Dropped {
                reason: "event originates from the global shard".to_string(),
            });
        }

        let source = SourceRef::new(event.shard_key, event.record.id);
        let mut params = ReplicateArticleParams {
            source,
            author: event.record.author,
            title: event.record.title,
            content: event.record.content,
            published_at: event.record.published_at,
        };

        if let Some(sources) = self.sources.as_ref() {
            let Some(store) = sources.get(source.shard_key) else {
                return Ok(Delivery::Dropped {
                    reason: format!("shard `{}` is not registered", source.shard_key),
                });
            };
            let current = store.find_article(source.record_id).await.map_err(|err| {
                ReplicationError::SourceUnavailable {
                    shard: source.shard_key,
                    record_id: source.record_id,
                    source: err,
                }
            })?;
            let Some(current) = current else {
                return Ok(Delivery::Dropped {
                    reason: format!(
                        "source article `{}` no longer exists in `{}`",
                        source.record_id, source.shard_key
                    ),
                });
            };
            params.author = current.author;
            params.title = current.title;
            params.content = current.content;
            params.published_at = current.published_at;
        }

        let projection = self
            .projections
            .insert_projection(params)
            .await
            .map_err(|err| ReplicationError::CommitFailed {
                shard: source.shard_key,
                record_id: source.record_id,
                source: err,
            })?;

        if let Some(cache) = self.cache.as_ref() {
            cache.remove(ShardKey::Global, projection.id).await;
        }

        Ok(Delivery::Committed {
            global_id: projection.id,
        })
    }
}

pub async fn process_replicate_article_job(
    job: ReplicateArticleJob,
    context: Data<ReplicationContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    match ctx.consumer.apply(&job).await {
        Ok(Delivery::Committed { global_id }) => {
            counter!(METRIC_COMMITTED).increment(1);
            info!(target = SOURCE, global_id, "replicated article committed");
            Ok(())
        }
        Ok(Delivery::Dropped { reason }) => {
            counter!(METRIC_DROPPED).increment(1);
            warn!(target = SOURCE, reason = %reason, "dropping replication message");
            Ok(())
        }
        Err(err) => {
            counter!(METRIC_REQUEUED).increment(1);
            warn!(target = SOURCE, error = %err, "replication commit failed; requeueing");
            Err(job_failed(err))
        }
    }
}
