use futures::future::join_all;
use metrics::counter;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::domain::{
    dto::{ArticleDto, CommentDto},
    shard::ShardKey,
};

use super::{
    error::RouterError,
    service::{SOURCE, ShardRouter, new_trace_id},
    types::{RecentArticles, ShardFailure},
};

const METRIC_FANOUT_SHARD_FAILED: &str = "shardpress_fanout_shard_failed_total";

impl ShardRouter {
    /// Point lookup through the article cache.
    pub async fn get(&self, shard: &str, id: i64) -> Result<ArticleDto, RouterError> {
        let (key, store) = self.resolve(shard)?;

        if let Some(cache) = self.articles.as_ref() {
            if let Some(cached) = cache.get(key, id).await {
                return Ok(cached);
            }
        }

        let record = store
            .find_article(id)
            .await?
            .ok_or_else(|| RouterError::not_found("article", key, id))?;

        let dto = ArticleDto::from_record(&record, new_trace_id());
        if let Some(cache) = self.articles.as_ref() {
            cache.set(&dto).await;
        }
        Ok(dto)
    }

    /// Articles published within `window` from every registered shard, global included.
    ///
    /// Shards that fail are skipped and listed in [`RecentArticles::failed_shards`].
    pub async fn list_recent(&self, window: Duration) -> RecentArticles {
        let since = OffsetDateTime::now_utc() - window;
        let queries = self.registry.iter().map(|(key, store)| async move {
            (key, store.list_published_since(since).await)
        });

        let mut recent = RecentArticles::default();
        for (key, outcome) in join_all(queries).await {
            match outcome {
                Ok(mut articles) => {
                    debug!(target = SOURCE, shard = %key, count = articles.len(), "shard listed");
                    recent.articles.append(&mut articles);
                }
                Err(err) => {
                    counter!(METRIC_FANOUT_SHARD_FAILED, "shard" => key.as_str()).increment(1);
                    warn!(target = SOURCE, shard = %key, error = %err, "skipping failed shard");
                    recent.failed_shards.push(ShardFailure {
                        shard: key,
                        message: err.to_string(),
                    });
                }
            }
        }
        recent
    }

    /// Comments of one article through the comment cache. Empty listings are not cached.
    pub async fn list_comments(
        &self,
        shard: &str,
        article_id: i64,
    ) -> Result<Vec<CommentDto>, RouterError> {
        let (key, store) = self.resolve(shard)?;

        if let Some(cache) = self.comments.as_ref() {
            if let Some(cached) = cache.get(key, article_id).await {
                return Ok(cached);
            }
        }

        let comments: Vec<CommentDto> = store
            .list_comments(article_id)
            .await?
            .iter()
            .map(CommentDto::from)
            .collect();

        if !comments.is_empty() {
            if let Some(cache) = self.comments.as_ref() {
                cache.set(key, article_id, &comments).await;
            }
        }
        Ok(comments)
    }

    pub(crate) async fn invalidate_article(&self, key: ShardKey, id: i64) {
        if let Some(cache) = self.articles.as_ref() {
            cache.remove(key, id).await;
        }
    }
}
