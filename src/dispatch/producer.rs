//! Publishes login notification requests to the dispatch queue.

use std::sync::Arc;

use crate::queue::{DispatchQueue, QueueError};

use super::message::DispatchMessage;

/// Serializes dispatch requests onto the queue. No retries of its own.
#[derive(Clone)]
pub struct MessageProducer {
    queue: Arc<dyn DispatchQueue>,
}

impl MessageProducer {
    pub fn new(queue: Arc<dyn DispatchQueue>) -> Self {
        Self { queue }
    }

    /// Publish a login notification for `email` and return the message id.
    pub async fn publish(&self, email: &str) -> Result<String, QueueError> {
        let message = DispatchMessage::login(email);
        let body = message.to_json()?;

        let id = self.queue.send(body).await?;

        tracing::debug!(
            email = %email,
            message_id = %id,
            backend = self.queue.backend_name(),
            "Dispatch message published"
        );
        Ok(id)
    }
}
