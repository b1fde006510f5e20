//! Login attempt tracking.
//!
//! Backends:
//! - `postgres`: durable store using an atomic upsert
//! - `memory`: process-local map for development and tests

mod memory_store;
mod postgres_store;
mod store;

pub use memory_store::MemoryAttemptStore;
pub use postgres_store::PostgresAttemptStore;
pub use store::{AttemptRecord, AttemptStore, RecordedAttempt, StorageError, WriteKind};

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::postgres::PostgresPool;

/// Create an attempt store based on configuration.
///
/// `"postgres"` needs a pool; without one the memory store is used.
pub fn create_attempt_store(
    config: &DatabaseConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn AttemptStore> {
    match (config.backend.as_str(), postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(
                backend = "postgres",
                url = %pool.database_url_masked(),
                "Creating PostgreSQL attempt store"
            );
            Arc::new(PostgresAttemptStore::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL store requested but no pool provided, falling back to memory");
            Arc::new(MemoryAttemptStore::new())
        }
        (backend, _) => {
            tracing::info!(backend = %backend, "Creating in-memory attempt store");
            Arc::new(MemoryAttemptStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_falls_back_to_memory_without_pool() {
        let config = DatabaseConfig::default();
        let store = create_attempt_store(&config, None);
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_factory_memory_backend() {
        let config = DatabaseConfig {
            backend: "memory".into(),
            ..DatabaseConfig::default()
        };
        assert_eq!(create_attempt_store(&config, None).backend_name(), "memory");
    }
}
