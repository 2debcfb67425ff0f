//! Shared Redis handle for the identity and subscription backends.

use std::future::Future;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::Mutex;

use crate::config::RedisConfig;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
}

/// A single multiplexed connection, opened on first use.
///
/// Commands run on clones of it. A connection-level failure discards the
/// cached connection so the next command reconnects.
pub struct RedisPool {
    client: Client,
    cached: Mutex<Option<MultiplexedConnection>>,
    config: RedisConfig,
}

impl RedisPool {
    /// Validate the URL. No connection is made until the first command.
    pub fn new(config: RedisConfig) -> Result<Self, PoolError> {
        Ok(Self {
            client: Client::open(config.url.as_str())?,
            cached: Mutex::new(None),
            config,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut cached = self.cached.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .inspect_err(|e| {
                tracing::error!(url = %self.config.url, error = %e, "Redis connect failed")
            })?;
        tracing::info!(url = %self.config.url, "Redis connection established");

        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn discard(&self) {
        self.cached.lock().await.take();
        tracing::warn!(url = %self.config.url, "Dropped broken Redis connection");
    }

    /// Run one command (or pipeline) on the shared connection.
    pub async fn execute<F, T, Fut>(&self, command: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let result = command(conn).await;

        if let Err(e) = &result {
            if e.is_connection_dropped() || e.is_io_error() {
                self.discard().await;
            }
        }
        Ok(result?)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Round-trip a PING; used once at boot.
    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not a redis url".to_string(),
        };
        assert!(RedisPool::new(config).is_err());
    }

    #[test]
    fn test_open_is_lazy() {
        // Nothing listens here; construction must still succeed
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        };
        let pool = RedisPool::new(config).unwrap();
        assert_eq!(pool.url(), "redis://127.0.0.1:1");
    }
}
