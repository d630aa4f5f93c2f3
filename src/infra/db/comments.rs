use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CommentsRepo, CreateCommentParams, RepoError},
    domain::entities::CommentRecord,
};

use super::{PostgresShard, map_sqlx_error, util::parse_stored_shard};

const COMMENT_COLUMNS: &str = "id, article_id, author, text, shard_key, created_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: i64,
    author: String,
    text: String,
    shard_key: String,
    created_at: OffsetDateTime,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            article_id: row.article_id,
            author: row.author,
            text: row.text,
            shard_key: parse_stored_shard(&row.shard_key)?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CommentsRepo for PostgresShard {
    async fn list_comments(&self, article_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE article_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(CommentRecord::try_from).collect()
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO comments (article_id, author, text, shard_key) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(params.article_id)
            .bind(&params.author)
            .bind(&params.text)
            .bind(self.key().as_str())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        CommentRecord::try_from(row)
    }
}
