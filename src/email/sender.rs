use async_trait::async_trait;
use thiserror::Error;

use crate::dispatch::DispatchMessage;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sender misconfigured: {0}")]
    Config(String),
}

/// Delivers one notification email. Implementations do not retry;
/// redelivery is the queue's job.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, message: &DispatchMessage) -> Result<(), SendError>;
}
