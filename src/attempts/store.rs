//! Storage trait for login attempt records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::postgres::PostgresPoolError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend is temporarily unavailable (e.g., circuit breaker open)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<PostgresPoolError> for StorageError {
    fn from(err: PostgresPoolError) -> Self {
        match err {
            PostgresPoolError::Sqlx(e) => StorageError::Database(e),
            PostgresPoolError::CircuitOpen => {
                StorageError::Unavailable("circuit breaker is open".to_string())
            }
        }
    }
}

/// One row per email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub email: String,
    pub attempt_count: i64,
    pub last_attempt_at: DateTime<Utc>,
}

/// Whether a write created the record or bumped an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

impl WriteKind {
    /// Label used by the storage operation counter
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub record: AttemptRecord,
    pub kind: WriteKind,
}

/// Persistence for login attempts.
///
/// `record_attempt` must be atomic per email: concurrent calls for the same
/// address each add exactly one to the counter.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Backend identifier for logs
    fn backend_name(&self) -> &'static str;

    /// Create the backing table if needed. Safe to call repeatedly.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Create the record with a count of one, or increment it and move the
    /// timestamp forward.
    async fn record_attempt(&self, email: &str) -> Result<RecordedAttempt, StorageError>;

    async fn lookup(&self, email: &str) -> Result<Option<AttemptRecord>, StorageError>;
}
