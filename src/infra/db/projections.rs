use async_trait::async_trait;

use crate::{
    application::repos::{ArticleChanges, ProjectionsRepo, ReplicateArticleParams, RepoError},
    domain::entities::{ArticleRecord, SourceRef},
};

use super::{GLOBAL_ARTICLE_COLUMNS, PostgresShard, articles::ArticleRow, map_sqlx_error};

impl PostgresShard {
    fn ensure_global(&self) -> Result<(), RepoError> {
        if self.key.is_global() {
            return Ok(());
        }
        Err(RepoError::InvalidInput {
            message: format!("shard `{}` does not hold projections", self.key),
        })
    }
}

#[async_trait]
impl ProjectionsRepo for PostgresShard {
    async fn insert_projection(
        &self,
        params: ReplicateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        self.ensure_global()?;
        let sql = format!(
            "WITH inserted AS ( \
                 INSERT INTO articles \
                     (author, title, content, shard_key, published_at, source_shard_key, source_record_id) \
                 VALUES ($1, $2, $3, 'global', $4, $5, $6) \
                 ON CONFLICT (source_shard_key, source_record_id) DO NOTHING \
                 RETURNING {GLOBAL_ARTICLE_COLUMNS} \
             ) \
             SELECT {GLOBAL_ARTICLE_COLUMNS} FROM inserted \
             UNION ALL \
             SELECT {GLOBAL_ARTICLE_COLUMNS} FROM articles \
              WHERE source_shard_key = $5 AND source_record_id = $6 \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&params.author)
            .bind(&params.title)
            .bind(&params.content)
            .bind(params.published_at)
            .bind(params.source.shard_key.as_str())
            .bind(params.source.record_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        // A concurrent insert of the same pair can hide from this statement's snapshot.
        let row = row.ok_or_else(|| {
            RepoError::from_persistence(format!(
                "projection of `{}` record `{}` raced a concurrent insert",
                params.source.shard_key, params.source.record_id
            ))
        })?;

        self.article_from_row(row)
    }

    async fn update_projection(
        &self,
        source: &SourceRef,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.ensure_global()?;
        let sql = format!(
            "UPDATE articles \
                SET author = $3, title = $4, content = $5, updated_at = now() \
              WHERE source_shard_key = $1 AND source_record_id = $2 \
             RETURNING {GLOBAL_ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(source.shard_key.as_str())
            .bind(source.record_id)
            .bind(&changes.author)
            .bind(&changes.title)
            .bind(&changes.content)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| self.article_from_row(row)).transpose()
    }

    async fn delete_projection(
        &self,
        source: &SourceRef,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.ensure_global()?;
        let sql = format!(
            "DELETE FROM articles \
              WHERE source_shard_key = $1 AND source_record_id = $2 \
             RETURNING {GLOBAL_ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(source.shard_key.as_str())
            .bind(source.record_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| self.article_from_row(row)).transpose()
    }
}
