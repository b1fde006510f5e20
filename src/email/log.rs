//! Development sender that logs instead of delivering.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::config::EmailConfig;
use crate::dispatch::DispatchMessage;

use super::content::EmailTemplates;
use super::sender::{EmailSender, SendError};

pub struct LogEmailSender {
    templates: EmailTemplates,
    sent: AtomicU64,
}

impl LogEmailSender {
    pub fn new(config: EmailConfig) -> Result<Self, SendError> {
        Ok(Self {
            templates: EmailTemplates::new(config)?,
            sent: AtomicU64::new(0),
        })
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &DispatchMessage) -> Result<(), SendError> {
        let content = self.templates.render(message)?;
        self.sent.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            to = %content.to,
            subject = %content.subject,
            "Login notification (not delivered, log sender)"
        );
        tracing::debug!(body = %content.text_body, "Notification body");
        Ok(())
    }
}
