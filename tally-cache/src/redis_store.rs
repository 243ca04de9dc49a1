//! Redis key-value store.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::traits::KeyValueStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::info;

/// Redis-backed store.
///
/// Holds one multiplexed connection that reconnects on its own. Cloning is
/// cheap and shares the connection; dropping the last clone closes it.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `config.url`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tally_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::redis("redis://localhost:6379");
    ///     let store = RedisStore::connect(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let connection = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!(url = %config.url, "Connected to Redis");
        Ok(Self { connection })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}

/// TTL in milliseconds for `PX` / `PEXPIRE`.
///
/// Redis rejects a zero expiry, so round up to one millisecond. A TTL too
/// large for Redis is a configuration error.
fn ttl_millis(ttl: Duration) -> CacheResult<i64> {
    i64::try_from(ttl.as_millis())
        .map(|millis| millis.max(1))
        .map_err(|_| CacheError::Config(format!("TTL of {ttl:?} is too large for Redis")))
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl)?);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        let new_value: i64 = conn.incr(key, 1).await?;
        Ok(new_value)
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> CacheResult<u64> {
        let mut conn = self.connection.clone();
        let len: u64 = conn.rpush(key, value).await?;
        Ok(len)
    }

    async fn append_pair(
        &self,
        first: (&str, Vec<u8>),
        second: (&str, Vec<u8>),
    ) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: (u64, u64) = redis::pipe()
            .atomic()
            .rpush(first.0, first.1)
            .rpush(second.0, second.1)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let values: Vec<Vec<u8>> = conn.lrange(key, start, stop).await?;
        Ok(values)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let applied: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl)?)
            .query_async(&mut conn)
            .await?;
        Ok(applied)
    }

    async fn flush_all(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }
}
