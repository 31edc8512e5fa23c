//! Redis-backed [`CacheBackend`].
//!
//! The connection is established by a background task; until it succeeds
//! every operation reports [`CacheError::NotReady`].

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{BackendFuture, CacheBackend};
use crate::error::{CacheError, ConfigError};
use crate::retry::Backoff;

pub struct RedisBackend {
    client: redis::Client,
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Validate the URL without touching the network.
    pub fn open(url: &str) -> Result<Self, ConfigError> {
        let client =
            redis::Client::open(url).map_err(|e| ConfigError::InvalidRedisUrl(e.to_string()))?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
        })
    }

    pub async fn is_ready(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Single connection attempt.
    pub async fn connect(&self) -> Result<(), CacheError> {
        let manager = self
            .client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Backend(format!("failed to connect to redis: {e}")))?;
        *self.connection.write().await = Some(manager);
        Ok(())
    }

    /// Keep trying to connect in the background until it works.
    pub fn spawn_connect(self: Arc<Self>, backoff: Backoff) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match self.connect().await {
                    Ok(()) => {
                        info!(attempt, "redis cache connected");
                        return;
                    }
                    Err(error) => {
                        let delay = backoff.delay(attempt);
                        warn!(
                            attempt,
                            %error,
                            retry_in_ms = delay.as_millis() as u64,
                            "redis cache not ready"
                        );
                        attempt = attempt.saturating_add(1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::NotReady)
    }
}

impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn get<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| CacheError::Backend(format!("redis GET failed: {e}")))?;
            Ok(value)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let seconds = ttl.as_secs().max(1);
            let _: () = conn
                .set_ex(key, value, seconds)
                .await
                .map_err(|e| CacheError::Backend(format!("redis SET failed: {e}")))?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let _: i64 = conn
                .del(key)
                .await
                .map_err(|e| CacheError::Backend(format!("redis DEL failed: {e}")))?;
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let _pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Backend(format!("redis PING failed: {e}")))?;
            Ok(())
        })
    }
}
