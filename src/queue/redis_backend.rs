//! Redis Streams dispatch queue.
//!
//! Each message is a stream entry with a single `body` field. Consumers share
//! one consumer group; a lease is an entry in the group's pending list, and
//! an expired lease is taken over with `XCLAIM` once it has been idle longer
//! than the visibility timeout. `ack` removes the entry from both the pending
//! list and the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::streams::StreamId;

use crate::config::QueueConfig;
use crate::redis::RedisPool;

use super::backend::{DispatchQueue, QueueError, ReceivedMessage};

const BODY_FIELD: &str = "body";

pub struct RedisDispatchQueue {
    pool: Arc<RedisPool>,
    stream: String,
    group: String,
    consumer: String,
    visibility_timeout: Duration,
    max_receive_count: Option<u32>,
    dead_letter_stream: String,
    group_ready: AtomicBool,
}

impl RedisDispatchQueue {
    pub fn new(config: &QueueConfig, pool: Arc<RedisPool>, consumer: String) -> Self {
        Self {
            pool,
            stream: config.stream.clone(),
            group: config.group.clone(),
            consumer,
            visibility_timeout: Duration::from_secs(config.visibility_timeout_seconds),
            max_receive_count: config.max_receive_count,
            dead_letter_stream: config.dead_letter_stream.clone(),
            group_ready: AtomicBool::new(false),
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    async fn ensure_group(&self) -> Result<(), QueueError> {
        if self.group_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        self.pool.ensure_group(&self.stream, &self.group).await?;
        self.group_ready.store(true, Ordering::Release);
        tracing::info!(
            stream = %self.stream,
            group = %self.group,
            consumer = %self.consumer,
            "Consumer group ready"
        );
        Ok(())
    }

    /// Forget the group when Redis lost it (flush, stream deleted) so the
    /// next receive recreates it.
    fn check_lost_group(&self, err: &QueueError) {
        if let QueueError::Redis(e) = err {
            if e.code() == Some("NOGROUP") {
                tracing::warn!(stream = %self.stream, group = %self.group, "Consumer group missing, will recreate");
                self.group_ready.store(false, Ordering::Release);
            }
        }
    }

    async fn lease(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut batch = self.reclaim_expired(max).await?;
        if batch.len() >= max {
            return Ok(batch);
        }

        // Only block when there is nothing to hand back yet
        let block_ms = if batch.is_empty() {
            wait.as_millis() as u64
        } else {
            0
        };

        let fresh = self
            .pool
            .xreadgroup(
                &self.stream,
                &self.group,
                &self.consumer,
                max - batch.len(),
                block_ms,
            )
            .await?;
        batch.extend(fresh.into_iter().map(|entry| self.to_received(entry, 1)));

        Ok(batch)
    }

    fn to_received(&self, entry: StreamId, receive_count: u32) -> ReceivedMessage {
        let body = entry.get::<String>(BODY_FIELD).unwrap_or_else(|| {
            tracing::warn!(message_id = %entry.id, "Stream entry has no body field");
            String::new()
        });

        ReceivedMessage {
            id: entry.id,
            body,
            receive_count,
        }
    }

    async fn dead_letter(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.pool
            .xadd(
                &self.dead_letter_stream,
                &[(BODY_FIELD, message.body.as_str()), ("source_id", message.id.as_str())],
            )
            .await?;
        self.pool
            .xack_del(&self.stream, &self.group, &message.id)
            .await?;

        tracing::warn!(
            message_id = %message.id,
            deliveries = message.receive_count - 1,
            dead_letter_stream = %self.dead_letter_stream,
            "Message exceeded max receive count, dead-lettering"
        );
        Ok(())
    }

    /// Take over leases that outlived the visibility timeout.
    async fn reclaim_expired(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        let min_idle_ms = self.visibility_timeout.as_millis() as u64;

        let pending = self
            .pool
            .xpending_idle(&self.stream, &self.group, min_idle_ms, max)
            .await?;
        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = pending.ids.iter().map(|p| p.id.clone()).collect();
        let claimed = self
            .pool
            .xclaim(&self.stream, &self.group, &self.consumer, min_idle_ms, &ids)
            .await?;

        let mut batch = Vec::with_capacity(claimed.len());
        for entry in claimed {
            let delivered = pending
                .ids
                .iter()
                .find(|p| p.id == entry.id)
                .map(|p| p.times_delivered as u32)
                .unwrap_or(1);
            let message = self.to_received(entry, delivered + 1);

            match self.max_receive_count {
                Some(cap) if delivered >= cap => self.dead_letter(&message).await?,
                _ => batch.push(message),
            }
        }

        if !batch.is_empty() {
            tracing::debug!(count = batch.len(), "Reclaimed expired leases");
        }
        Ok(batch)
    }
}

#[async_trait]
impl DispatchQueue for RedisDispatchQueue {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn send(&self, body: String) -> Result<String, QueueError> {
        let id = self
            .pool
            .xadd(&self.stream, &[(BODY_FIELD, body.as_str())])
            .await?;

        tracing::trace!(stream = %self.stream, message_id = %id, "Message appended to stream");
        Ok(id)
    }

    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.ensure_group().await?;

        self.lease(max.max(1), wait).await.inspect_err(|e| self.check_lost_group(e))
    }

    async fn ack(&self, id: &str) -> Result<(), QueueError> {
        self.pool.xack_del(&self.stream, &self.group, id).await?;
        Ok(())
    }
}
