use std::{convert::TryFrom, sync::Arc};

use apalis_sql::postgres::PostgresStorage;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::{
        entities::JobRecord,
        types::{JobState, JobType},
    },
};

use super::map_sqlx_error;

const JOB_COLUMNS: &str =
    "id, job_type, job, status, attempts, max_attempts, run_at, last_error, done_at";

/// The durable replication queue, stored in the `apalis` schema.
#[derive(Clone)]
pub struct PostgresQueue {
    pool: Arc<PgPool>,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    job: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    run_at: OffsetDateTime,
    last_error: Option<String>,
    done_at: Option<OffsetDateTime>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = JobType::try_from(row.job_type.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job type `{}`", row.job_type))
        })?;

        let state = JobState::try_from(row.status.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job state `{}`", row.status))
        })?;

        Ok(Self {
            id: row.id,
            job_type,
            payload: row.job,
            state,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            run_at: row.run_at,
            done_at: row.done_at,
            last_error: row.last_error,
        })
    }
}

impl PostgresQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `apalis` schema and its functions.
    pub async fn setup(&self) -> Result<(), sqlx::Error> {
        PostgresStorage::<()>::setup(self.pool()).await
    }
}

#[async_trait]
impl JobsRepo for PostgresQueue {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        sqlx::query_scalar::<_, String>(
            "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id",
        )
        .bind(job.job_type.as_str())
        .bind(&job.payload)
        .bind(JobState::Pending.as_str())
        .bind(job.run_at)
        .bind(job.max_attempts)
        .bind(job.priority)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM apalis.jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn list_dead_letters(
        &self,
        job_type: JobType,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} \
               FROM apalis.jobs \
              WHERE job_type = $1 \
                AND (status = 'Killed' OR (status = 'Failed' AND attempts >= max_attempts)) \
              ORDER BY run_at DESC, id DESC \
              LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_type.as_str())
            .bind(i64::from(limit.clamp(1, 1000)))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }
}
