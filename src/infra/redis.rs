//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};

use crate::cache::{CacheStore, CacheStoreError};

use super::error::InfraError;

/// Shares one multiplexed connection across all callers.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::configuration(format!("invalid redis url: {err}")))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;
        Ok(Self { connection })
    }
}

fn map_redis_error(err: redis::RedisError) -> CacheStoreError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        CacheStoreError::unavailable(err)
    } else {
        CacheStoreError::Command(err.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut connection = self.connection.clone();
        connection
            .get::<_, Option<String>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheStoreError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(key)
            .await
            .map_err(map_redis_error)
    }
}
