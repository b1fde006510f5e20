//! Redis access for the dispatch stream.

pub mod pool;

pub use pool::{PoolError, RedisPool};
