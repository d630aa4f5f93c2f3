use std::convert::TryFrom;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ArticleChanges, ArticlesRepo, CreateArticleParams, RepoError},
    domain::entities::{ArticleRecord, SourceRef},
};

use super::{
    PostgresShard, map_sqlx_error,
    util::{integrity_error, parse_stored_shard},
};

#[derive(sqlx::FromRow)]
pub(super) struct ArticleRow {
    id: i64,
    author: String,
    title: String,
    content: String,
    shard_key: String,
    published_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    source_record_id: Option<i64>,
    source_shard_key: Option<String>,
}

impl TryFrom<ArticleRow> for ArticleRecord {
    type Error = RepoError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let source = match (row.source_shard_key, row.source_record_id) {
            (Some(shard), Some(record_id)) => {
                Some(SourceRef::new(parse_stored_shard(&shard)?, record_id))
            }
            (None, None) => None,
            _ => {
                return Err(RepoError::Integrity {
                    message: format!("article `{}` has a partial source reference", row.id),
                });
            }
        };

        Ok(Self {
            id: row.id,
            author: row.author,
            title: row.title,
            content: row.content,
            shard_key: parse_stored_shard(&row.shard_key)?,
            published_at: row.published_at,
            updated_at: row.updated_at,
            source,
        })
    }
}

impl PostgresShard {
    /// Converts a row read from this shard and checks it belongs here.
    pub(super) fn article_from_row(&self, row: ArticleRow) -> Result<ArticleRecord, RepoError> {
        let record = ArticleRecord::try_from(row)?;
        record.ensure_resides_in(self.key).map_err(integrity_error)?;
        Ok(record)
    }

    fn articles_from_rows(
        &self,
        rows: Vec<ArticleRow>,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        rows.into_iter()
            .map(|row| self.article_from_row(row))
            .collect()
    }
}

#[async_trait]
impl ArticlesRepo for PostgresShard {
    async fn find_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!("SELECT {} FROM articles WHERE id = $1", self.article_columns());
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| self.article_from_row(row)).transpose()
    }

    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "INSERT INTO articles (author, title, content, shard_key, published_at) \
             VALUES ($1, $2, $3, $4, COALESCE($5, now())) \
             RETURNING {}",
            self.article_columns()
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&params.author)
            .bind(&params.title)
            .bind(&params.content)
            .bind(self.key.as_str())
            .bind(params.published_at)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        self.article_from_row(row)
    }

    async fn update_article(
        &self,
        id: i64,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!(
            "UPDATE articles \
                SET author = $2, title = $3, content = $4, updated_at = now() \
              WHERE id = $1 \
             RETURNING {}",
            self.article_columns()
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .bind(&changes.author)
            .bind(&changes.title)
            .bind(&changes.content)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| self.article_from_row(row)).transpose()
    }

    async fn delete_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!(
            "DELETE FROM articles WHERE id = $1 RETURNING {}",
            self.article_columns()
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| self.article_from_row(row)).transpose()
    }

    async fn list_published_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        let sql = format!(
            "SELECT {} FROM articles WHERE published_at >= $1 ORDER BY published_at, id",
            self.article_columns()
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(since)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        self.articles_from_rows(rows)
    }
}
