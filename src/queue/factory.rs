//! Dispatch queue factory

use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueConfig;
use crate::redis::RedisPool;

use super::backend::DispatchQueue;
use super::memory_backend::MemoryDispatchQueue;
use super::redis_backend::RedisDispatchQueue;

/// Create a dispatch queue based on configuration.
///
/// - `"redis"` (default): Redis Streams consumer group, needs a pool
/// - `"memory"`: process-local lease queue
///
/// A missing Redis pool falls back to memory. `consumer` names this process
/// inside the consumer group; producers may pass any value.
pub fn create_dispatch_queue(
    config: &QueueConfig,
    redis_pool: Option<Arc<RedisPool>>,
    consumer: String,
) -> Arc<dyn DispatchQueue> {
    let memory = || {
        Arc::new(MemoryDispatchQueue::new(
            Duration::from_secs(config.visibility_timeout_seconds),
            config.max_receive_count,
        ))
    };

    match config.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    stream = %config.stream,
                    group = %config.group,
                    consumer = %consumer,
                    "Creating Redis dispatch queue"
                );
                Arc::new(RedisDispatchQueue::new(config, pool, consumer))
            } else {
                tracing::warn!("Redis queue requested but no pool provided, falling back to memory");
                memory()
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory dispatch queue");
            memory()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falls_back_to_memory_without_pool() {
        let queue = create_dispatch_queue(&QueueConfig::default(), None, "w".into());
        assert_eq!(queue.backend_name(), "memory");
    }

    #[test]
    fn test_memory_backend() {
        let config = QueueConfig {
            backend: "memory".into(),
            ..QueueConfig::default()
        };
        let queue = create_dispatch_queue(&config, None, "w".into());
        assert_eq!(queue.backend_name(), "memory");
    }
}
