//! Login ingress: validate, record the attempt, enqueue the notification.

use std::sync::Arc;

use crate::attempts::AttemptStore;
use crate::dispatch::MessageProducer;
use crate::error::AppError;
use crate::metrics::{LoginOutcome, Metrics};

use super::validation::EmailValidator;

/// Client-facing message for a rejected request
pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email format";

/// Client-facing message for an accepted request
pub const QUEUED_MESSAGE: &str = "Email queued for sending";

/// Storage operation label used for the attempt lookup timer
const QUERY_OPERATION: &str = "user_lookup";

/// Result of an accepted login. Not returned to the client.
#[derive(Debug, Clone)]
pub struct LoginAccepted {
    pub attempt_count: i64,
    pub message_id: String,
}

pub struct LoginService {
    store: Arc<dyn AttemptStore>,
    producer: MessageProducer,
    validator: Arc<EmailValidator>,
    metrics: Arc<Metrics>,
}

impl LoginService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        producer: MessageProducer,
        validator: Arc<EmailValidator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            producer,
            validator,
            metrics,
        }
    }

    /// Record a login attempt and enqueue its notification.
    ///
    /// Invalid input never reaches the store. A publish failure after the
    /// attempt was stored leaves the attempt counted with no notification.
    pub async fn record_login(&self, email: &str) -> Result<LoginAccepted, AppError> {
        let errors = self.validator.validate(email);
        if !errors.is_empty() {
            self.metrics.record_login(LoginOutcome::Invalid);
            tracing::warn!(email = %email, errors = ?errors, "Login attempt with invalid email");
            return Err(AppError::validation(INVALID_EMAIL_MESSAGE, errors));
        }

        let recorded = {
            let _timer = self.metrics.start_query_timer(QUERY_OPERATION);
            self.store.record_attempt(email).await
        };
        let recorded = match recorded {
            Ok(recorded) => recorded,
            Err(e) => {
                self.record_failure();
                tracing::error!(email = %email, error = %e, "Failed to record login attempt");
                return Err(e.into());
            }
        };
        self.metrics.record_storage_op(recorded.kind.as_str(), true);

        tracing::info!(
            email = %email,
            attempts = recorded.record.attempt_count,
            "User login attempt recorded"
        );

        let message_id = match self.producer.publish(email).await {
            Ok(id) => id,
            Err(e) => {
                self.record_failure();
                tracing::error!(
                    email = %email,
                    attempts = recorded.record.attempt_count,
                    error = %e,
                    "Attempt recorded but notification could not be queued"
                );
                return Err(e.into());
            }
        };

        self.metrics.emails_queued.inc();
        self.metrics.record_login(LoginOutcome::Success);
        tracing::info!(email = %email, message_id = %message_id, "Email request queued");

        Ok(LoginAccepted {
            attempt_count: recorded.record.attempt_count,
            message_id,
        })
    }

    fn record_failure(&self) {
        self.metrics.record_login(LoginOutcome::Error);
        self.metrics.record_storage_op("unknown", false);
    }
}
