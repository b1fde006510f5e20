//! PostgreSQL attempt store.
//!
//! Table structure:
//! - `users`: one row per email with the attempt counter and last attempt time

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::postgres::PostgresPool;

use super::store::{AttemptRecord, AttemptStore, RecordedAttempt, StorageError, WriteKind};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(254) NOT NULL UNIQUE,
    login_attempts BIGINT NOT NULL DEFAULT 1,
    last_login_attempt TIMESTAMPTZ NOT NULL
)
"#;

// `xmax = 0` only holds for a freshly inserted tuple, which tells the
// insert and update branches of the upsert apart.
const UPSERT_ATTEMPT: &str = r#"
INSERT INTO users (email, login_attempts, last_login_attempt)
VALUES ($1, 1, $2)
ON CONFLICT (email) DO UPDATE
SET login_attempts = users.login_attempts + 1,
    last_login_attempt = GREATEST(users.last_login_attempt, EXCLUDED.last_login_attempt)
RETURNING email, login_attempts, last_login_attempt, (xmax = 0) AS inserted
"#;

const SELECT_ATTEMPT: &str = r#"
SELECT email, login_attempts, last_login_attempt
FROM users
WHERE email = $1
"#;

pub struct PostgresAttemptStore {
    pool: Arc<PostgresPool>,
}

impl PostgresAttemptStore {
    pub fn new(pool: Arc<PostgresPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PostgresAttemptStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        self.pool
            .execute(|pool| async move { sqlx::query(CREATE_TABLE).execute(&pool).await })
            .await?;

        tracing::info!("Attempt store schema ensured");
        Ok(())
    }

    async fn record_attempt(&self, email: &str) -> Result<RecordedAttempt, StorageError> {
        let email = email.to_string();
        let now = Utc::now();

        let (email, attempt_count, last_attempt_at, inserted): (String, i64, DateTime<Utc>, bool) =
            self.pool
                .execute(|pool| async move {
                    sqlx::query_as(UPSERT_ATTEMPT)
                        .bind(email)
                        .bind(now)
                        .fetch_one(&pool)
                        .await
                })
                .await?;

        let kind = if inserted {
            WriteKind::Insert
        } else {
            WriteKind::Update
        };

        tracing::trace!(
            email = %email,
            attempts = attempt_count,
            operation = kind.as_str(),
            "Login attempt persisted"
        );

        Ok(RecordedAttempt {
            record: AttemptRecord {
                email,
                attempt_count,
                last_attempt_at,
            },
            kind,
        })
    }

    async fn lookup(&self, email: &str) -> Result<Option<AttemptRecord>, StorageError> {
        let email = email.to_string();

        let row: Option<(String, i64, DateTime<Utc>)> = self
            .pool
            .execute(|pool| async move {
                sqlx::query_as(SELECT_ATTEMPT)
                    .bind(email)
                    .fetch_optional(&pool)
                    .await
            })
            .await?;

        Ok(row.map(|(email, attempt_count, last_attempt_at)| AttemptRecord {
            email,
            attempt_count,
            last_attempt_at,
        }))
    }
}
