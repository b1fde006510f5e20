//! Redis connection pool for the dispatch stream.
//!
//! Wraps a multiplexed connection with circuit breaker accounting and
//! exposes the handful of stream commands the queue adapter needs.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;
use crate::resilience::{CircuitBreaker, CircuitState};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

/// Redis pool shared by producers and consumers of the dispatch stream.
///
/// Blocking reads (`XREADGROUP ... BLOCK`) hold the multiplexed pipe while
/// they wait, so a consumer should own its pool.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    url: String,
}

impl RedisPool {
    pub fn new(config: &RedisConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            url: config.url.clone(),
        })
    }

    /// Get the shared connection, connecting lazily.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.circuit_breaker.record_success();
                tracing::info!(url = %self.url, "Redis connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command with breaker accounting, dropping the cached
    /// connection when the transport failed.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await.map(|_| ())
        })
        .await
    }

    /// Create the consumer group (and the stream) if missing.
    ///
    /// The group starts at the beginning of the stream so entries published
    /// before any consumer existed are still delivered.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), PoolError> {
        let stream = stream.to_string();
        let group = group.to_string();
        self.execute(|mut conn| async move {
            let created: RedisResult<()> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&stream)
                .arg(&group)
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;
            match created {
                Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
                other => other,
            }
        })
        .await
    }

    /// Append an entry and return its stream id.
    pub async fn xadd(&self, stream: &str, fields: &[(&str, &str)]) -> Result<String, PoolError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }

        self.execute(|mut conn| async move { cmd.query_async(&mut conn).await })
            .await
    }

    /// Read never-delivered entries for `consumer`, blocking up to `block_ms`.
    pub async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamId>, PoolError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(count);
        if block_ms > 0 {
            cmd.arg("BLOCK").arg(block_ms);
        }
        cmd.arg("STREAMS").arg(stream).arg(">");

        // A block that times out replies with nil
        let reply: Option<StreamReadReply> = self
            .execute(|mut conn| async move { cmd.query_async(&mut conn).await })
            .await?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default())
    }

    /// Pending entries idle for at least `min_idle_ms`, oldest first.
    pub async fn xpending_idle(
        &self,
        stream: &str,
        group: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<StreamPendingCountReply, PoolError> {
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(stream)
            .arg(group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count);

        self.execute(|mut conn| async move { cmd.query_async(&mut conn).await })
            .await
    }

    /// Take over expired leases. Entries another consumer claimed first are
    /// simply absent from the reply.
    pub async fn xclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<StreamId>, PoolError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream).arg(group).arg(consumer).arg(min_idle_ms);
        for id in ids {
            cmd.arg(id);
        }

        let reply: StreamClaimReply = self
            .execute(|mut conn| async move { cmd.query_async(&mut conn).await })
            .await?;
        Ok(reply.ids)
    }

    /// Acknowledge and delete an entry in one round trip.
    pub async fn xack_del(&self, stream: &str, group: &str, id: &str) -> Result<(), PoolError> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id)
            .ignore()
            .cmd("XDEL")
            .arg(stream)
            .arg(id)
            .ignore();

        self.execute(|mut conn| async move { pipe.query_async::<()>(&mut conn).await })
            .await
    }
}
