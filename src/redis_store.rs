//! Redis-backed [`ImageStore`].
//!
//! Each collection is a Redis set of image URLs. Sampling uses
//! `SRANDMEMBER` with a positive count, which returns distinct members.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, FromRedisValue};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::ImageStore;

pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    connect_timeout: Duration,
}

impl RedisStore {
    /// Create a store for `redis_url`. No connection is made until first use.
    pub fn new(redis_url: &str, connect_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connect(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            connect_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.connect_timeout))?
        .map_err(|e| StoreError::Connect(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, StoreError> {
        let mut conn = self.connection().await?;
        match cmd.query_async(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_connection_dropped() || err.is_io_error() || err.is_connection_refusal() {
                    warn!(error = %err, "Dropping broken Redis connection");
                    *self.connection.lock().await = None;
                }
                Err(StoreError::from(err))
            }
        }
    }

    /// Add URLs to a collection. Returns how many were not already present.
    pub async fn add(&self, collection: &str, urls: &[String]) -> Result<usize, StoreError> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("SADD");
        cmd.arg(collection).arg(urls);
        self.query(&cmd).await
    }
}

#[async_trait]
impl ImageStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn connect(&self) -> Result<(), StoreError> {
        self.connection().await.map(|_| ())
    }

    async fn sample(&self, collection: &str, count: usize) -> Result<Vec<String>, StoreError> {
        let mut cmd = redis::cmd("SRANDMEMBER");
        cmd.arg(collection).arg(count);
        self.query(&cmd).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let reply: String = self.query(&redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Query(format!("Unexpected PING reply: {}", reply)))
        }
    }
}
