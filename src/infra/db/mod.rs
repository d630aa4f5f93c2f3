//! Postgres-backed shard and queue adapters.

mod articles;
mod comments;
mod jobs;
mod projections;
mod util;

pub use jobs::PostgresQueue;
pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::domain::shard::ShardKey;

const REGIONAL_ARTICLE_COLUMNS: &str = "id, author, title, content, shard_key, published_at, \
    updated_at, NULL::BIGINT AS source_record_id, NULL::TEXT AS source_shard_key";

const GLOBAL_ARTICLE_COLUMNS: &str = "id, author, title, content, shard_key, published_at, \
    updated_at, source_record_id, source_shard_key";

/// One shard database. The same type serves regional shards and the global shard; the key
/// decides which schema it migrates and which columns it reads.
#[derive(Clone)]
pub struct PostgresShard {
    key: ShardKey,
    pool: Arc<PgPool>,
}

impl PostgresShard {
    pub fn new(key: ShardKey, pool: PgPool) -> Self {
        Self {
            key,
            pool: Arc::new(pool),
        }
    }

    pub fn key(&self) -> ShardKey {
        self.key
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        if self.key.is_global() {
            sqlx::migrate!("./migrations/global")
                .run(self.pool())
                .await
                .map_err(Into::into)
        } else {
            sqlx::migrate!("./migrations/shard")
                .run(self.pool())
                .await
                .map_err(Into::into)
        }
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn article_columns(&self) -> &'static str {
        if self.key.is_global() {
            GLOBAL_ARTICLE_COLUMNS
        } else {
            REGIONAL_ARTICLE_COLUMNS
        }
    }
}
