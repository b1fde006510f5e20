//! Durable dispatch queue.
//!
//! Backends:
//! - `redis`: Redis Streams with a consumer group, shared by every worker
//! - `memory`: in-process lease queue for development and tests
//!
//! Both implement visibility-timeout redelivery and optional dead-lettering
//! after `queue.max_receive_count` deliveries.

mod backend;
mod factory;
mod memory_backend;
mod redis_backend;

pub use backend::{DispatchQueue, QueueError, ReceivedMessage};
pub use factory::create_dispatch_queue;
pub use memory_backend::MemoryDispatchQueue;
pub use redis_backend::RedisDispatchQueue;
