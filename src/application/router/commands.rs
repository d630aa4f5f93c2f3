use tracing::{info, warn};

use crate::{
    application::repos::{ArticleChanges, CreateArticleParams, CreateCommentParams},
    domain::{
        dto::{ArticleDto, CommentDto, ReplicationEvent},
        entities::SourceRef,
        shard::ShardKey,
    },
};

use super::{
    error::RouterError,
    service::{SOURCE, ShardRouter, ensure_non_empty, new_trace_id},
};

impl ShardRouter {
    /// Commits the article to its shard, caches it, then publishes a replication event.
    ///
    /// Publishing is best effort: once the shard commit succeeded the call succeeds. Articles
    /// created directly in the global shard are not replicated.
    pub async fn create(
        &self,
        shard: &str,
        params: CreateArticleParams,
    ) -> Result<ArticleDto, RouterError> {
        let (key, store) = self.resolve(shard)?;
        ensure_non_empty(&params.title, "title")?;
        ensure_non_empty(&params.content, "content")?;
        ensure_non_empty(&params.author, "author")?;
        self.moderate(&format!("{} {}", params.title, params.content))
            .await?;

        let record = store.create_article(params).await?;
        let trace_id = new_trace_id();
        let dto = ArticleDto::from_record(&record, trace_id.clone());

        info!(
            target = SOURCE,
            shard = %key,
            article_id = record.id,
            trace_id = %trace_id,
            "article created"
        );

        if let Some(cache) = self.articles.as_ref() {
            cache.set(&dto).await;
        }

        if !key.is_global() {
            if let Some(publisher) = self.publisher.as_ref() {
                let event = ReplicationEvent {
                    shard_key: key,
                    record: dto.clone(),
                    trace_id,
                };
                publisher.publish_best_effort(&event).await;
            }
        }

        Ok(dto)
    }

    /// Replaces the editable fields and mirrors the change onto the global projection.
    ///
    /// The regional cache entry is dropped as soon as the shard commits, so a failed projection
    /// write never leaves the old content cached. Repeating the call retries the projection.
    pub async fn update(
        &self,
        shard: &str,
        id: i64,
        changes: ArticleChanges,
    ) -> Result<ArticleDto, RouterError> {
        let (key, store) = self.resolve(shard)?;
        ensure_non_empty(&changes.title, "title")?;
        ensure_non_empty(&changes.content, "content")?;
        ensure_non_empty(&changes.author, "author")?;
        self.moderate(&format!("{} {}", changes.title, changes.content))
            .await?;

        let record = store
            .update_article(id, &changes)
            .await?
            .ok_or_else(|| RouterError::not_found("article", key, id))?;
        self.invalidate_article(key, id).await;

        if !key.is_global() {
            let projection = self
                .registry
                .projections()
                .update_projection(&SourceRef::new(key, id), &changes)
                .await
                .inspect_err(|err| {
                    warn!(target = SOURCE, shard = %key, article_id = id, error = %err,
                        "shard updated but projection update failed");
                })?;
            if let Some(projection) = projection {
                self.invalidate_article(ShardKey::Global, projection.id)
                    .await;
            }
        }
        info!(target = SOURCE, shard = %key, article_id = id, "article updated");

        Ok(ArticleDto::from_record(&record, new_trace_id()))
    }

    /// Deletes the article and its global projection, if any.
    ///
    /// A regional row that is already gone still has its projection removed, so a call that
    /// failed on the projection can be repeated. `NotFound` means neither row existed.
    pub async fn delete(&self, shard: &str, id: i64) -> Result<(), RouterError> {
        let (key, store) = self.resolve(shard)?;

        let deleted = store.delete_article(id).await?;
        if deleted.is_some() {
            self.invalidate_article(key, id).await;
            if let Some(cache) = self.comments.as_ref() {
                cache.remove(key, id).await;
            }
        }

        let projection = if key.is_global() {
            None
        } else {
            self.registry
                .projections()
                .delete_projection(&SourceRef::new(key, id))
                .await
                .inspect_err(|err| {
                    warn!(target = SOURCE, shard = %key, article_id = id, error = %err,
                        "projection delete failed; repeat the delete to retry");
                })?
        };

        if deleted.is_none() && projection.is_none() {
            return Err(RouterError::not_found("article", key, id));
        }
        if let Some(projection) = projection.as_ref() {
            self.invalidate_article(ShardKey::Global, projection.id)
                .await;
        }
        info!(
            target = SOURCE,
            shard = %key,
            article_id = id,
            regional_deleted = deleted.is_some(),
            projection_deleted = projection.is_some(),
            "article deleted"
        );

        Ok(())
    }

    /// Adds a comment to an existing article and drops the cached listing.
    pub async fn create_comment(
        &self,
        shard: &str,
        params: CreateCommentParams,
    ) -> Result<CommentDto, RouterError> {
        let (key, store) = self.resolve(shard)?;
        ensure_non_empty(&params.text, "text")?;
        ensure_non_empty(&params.author, "author")?;

        let article_id = params.article_id;
        if store.find_article(article_id).await?.is_none() {
            return Err(RouterError::not_found("article", key, article_id));
        }
        self.moderate(&params.text).await?;

        let comment = store.create_comment(params).await?;
        if let Some(cache) = self.comments.as_ref() {
            cache.remove(key, article_id).await;
        }
        info!(
            target = SOURCE,
            shard = %key,
            article_id,
            comment_id = comment.id,
            "comment created"
        );

        Ok(CommentDto::from(&comment))
    }
}
