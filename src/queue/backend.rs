//! Backend trait for the durable dispatch queue.
//!
//! Delivery is at-least-once: a received message is leased to one consumer
//! and becomes receivable again when the lease expires without an `ack`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::redis::PoolError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable (e.g., circuit breaker open)
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for QueueError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => QueueError::Redis(e),
            PoolError::CircuitOpen => QueueError::Unavailable("circuit breaker is open".to_string()),
        }
    }
}

/// A leased message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Backend id, also the handle passed to `ack`
    pub id: String,
    pub body: String,
    /// Deliveries including this one
    pub receive_count: u32,
}

#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Backend identifier for logs
    fn backend_name(&self) -> &'static str;

    /// Publish a message body and return its id.
    async fn send(&self, body: String) -> Result<String, QueueError>;

    /// Lease up to `max` messages, waiting up to `wait` for the first one.
    /// An empty batch means nothing arrived in time.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Remove a message for good. Acking an unknown id is not an error.
    async fn ack(&self, id: &str) -> Result<(), QueueError>;
}
