//! Infrastructure layer modules
//!
//! Shared plumbing used by both binaries:
//! - `config`: Layered settings
//! - `error`: HTTP-facing error type
//! - `metrics`: Prometheus collectors
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connection pool with stream commands
//! - `resilience`: Circuit breaker and exponential backoff

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
pub mod resilience;
