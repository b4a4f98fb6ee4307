//! Credential store on a Redis connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use subgate_auth::{CredentialStore, StorageError, StorageResult};

use crate::{RedisStoreConfig, RedisStoreError};

/// Redis-backed [`CredentialStore`].
///
/// Cloning shares the pool.
#[derive(Clone)]
pub struct RedisCredentialStore {
    pool: Pool,
    key_prefix: Option<String>,
}

impl std::fmt::Debug for RedisCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCredentialStore")
            .field("pool", &self.pool.status())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisCredentialStore {
    /// Wraps an existing pool.
    pub fn new(pool: Pool, key_prefix: Option<String>) -> Self {
        Self { pool, key_prefix }
    }

    /// Builds a pool from `config` and checks that Redis answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or the first
    /// connection fails.
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, RedisStoreError> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        if let Some(ref mut pool_config) = redis_config.pool {
            let timeout = Duration::from_millis(config.timeout_ms);
            pool_config.max_size = config.pool_size;
            pool_config.timeouts.wait = Some(timeout);
            pool_config.timeouts.create = Some(timeout);
            pool_config.timeouts.recycle = Some(timeout);
        }

        let pool = redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("Connected to Redis");

        Ok(Self::new(pool, config.key_prefix.clone()))
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    async fn conn(&self) -> StorageResult<Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            StorageError::unavailable(format!("redis pool: {e}"))
        })
    }
}

fn redis_error(err: redis::RedisError) -> StorageError {
    StorageError::unavailable(format!("redis: {err}"))
}

// Redis takes a positive signed 64-bit expiry; round sub-millisecond TTLs up
// and clamp the rest.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        redis::cmd("GETDEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(removed > 0)
    }

    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration) -> StorageResult<()> {
        let key = self.key(set_key);
        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(&key)
            .arg(member)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> StorageResult<()> {
        let mut conn = self.conn().await?;
        let _: u64 = redis::cmd("SREM")
            .arg(self.key(set_key))
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn members(&self, set_key: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("SMEMBERS")
            .arg(self.key(set_key))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn delete_set(&self, set_key: &str) -> StorageResult<()> {
        self.delete(set_key).await.map(|_| ())
    }

    async fn ttl_remaining(&self, key: &str) -> StorageResult<Option<Duration>> {
        let mut conn = self.conn().await?;
        let millis: i64 = redis::cmd("PTTL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        // -2: no such key, -1: no expiry
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }
}
