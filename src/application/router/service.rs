use std::sync::Arc;

use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::{
        jobs::ReplicationPublisher,
        moderation::{ContentGate, GateError},
        repos::ShardStore,
        shards::ShardRegistry,
    },
    cache::{ArticleCache, CommentCache},
    domain::shard::ShardKey,
};

use super::error::RouterError;

pub(crate) const SOURCE: &str = "shardpress::application::router";

const METRIC_GATE_REJECTED: &str = "shardpress_moderation_rejected_total";
const METRIC_GATE_UNAVAILABLE: &str = "shardpress_moderation_unavailable_total";

/// Routes article and comment operations to the shard named by the caller.
///
/// Caches, the replication publisher and the moderation gate are optional collaborators;
/// without them the router talks to the shards directly.
#[derive(Clone)]
pub struct ShardRouter {
    pub(crate) registry: Arc<ShardRegistry>,
    pub(crate) articles: Option<Arc<ArticleCache>>,
    pub(crate) comments: Option<Arc<CommentCache>>,
    pub(crate) publisher: Option<Arc<ReplicationPublisher>>,
    pub(crate) gate: Option<Arc<dyn ContentGate>>,
}

impl ShardRouter {
    pub fn new(registry: Arc<ShardRegistry>) -> Self {
        Self {
            registry,
            articles: None,
            comments: None,
            publisher: None,
            gate: None,
        }
    }

    pub fn with_article_cache_opt(mut self, cache: Option<Arc<ArticleCache>>) -> Self {
        self.articles = cache;
        self
    }

    pub fn with_comment_cache_opt(mut self, cache: Option<Arc<CommentCache>>) -> Self {
        self.comments = cache;
        self
    }

    pub fn with_publisher_opt(mut self, publisher: Option<Arc<ReplicationPublisher>>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_gate_opt(mut self, gate: Option<Arc<dyn ContentGate>>) -> Self {
        self.gate = gate;
        self
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// Case-insensitive lookup; blank, unknown and unregistered keys all fail.
    pub fn resolve(&self, shard: &str) -> Result<(ShardKey, Arc<dyn ShardStore>), RouterError> {
        self.registry.resolve(shard).map_err(RouterError::from)
    }

    /// Runs `text` through the gate when one is configured.
    pub(crate) async fn moderate(&self, text: &str) -> Result<(), RouterError> {
        let Some(gate) = self.gate.as_ref() else {
            return Ok(());
        };

        match gate.is_clean(text).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                counter!(METRIC_GATE_REJECTED).increment(1);
                Err(RouterError::ContentRejected)
            }
            Err(err) => {
                counter!(METRIC_GATE_UNAVAILABLE).increment(1);
                if !matches!(err, GateError::CircuitOpen) {
                    warn!(target = SOURCE, error = %err, "moderation check failed");
                }
                Err(RouterError::DownstreamUnavailable(err))
            }
        }
    }
}

pub(crate) fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), RouterError> {
    if value.trim().is_empty() {
        return Err(RouterError::EmptyField(field));
    }
    Ok(())
}
