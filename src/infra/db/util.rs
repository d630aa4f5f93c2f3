use crate::{
    application::repos::RepoError,
    domain::{error::DomainError, shard::ShardKey},
};

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

pub(super) fn integrity_error(err: DomainError) -> RepoError {
    RepoError::Integrity {
        message: err.to_string(),
    }
}

/// Parses a stored shard key; anything unparseable is corrupt data.
pub(super) fn parse_stored_shard(raw: &str) -> Result<ShardKey, RepoError> {
    ShardKey::parse(raw).map_err(|err| RepoError::Integrity {
        message: format!("stored shard key `{raw}` is invalid: {err}"),
    })
}
