//! PostgreSQL access for the attempt store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
