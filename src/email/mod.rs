//! Notification email delivery.
//!
//! Providers:
//! - `smtp`: lettre async SMTP transport
//! - `log`: writes the notification to the log, for development

mod content;
mod log;
mod sender;
mod smtp;

pub use content::{EmailContent, EmailTemplates};
pub use log::LogEmailSender;
pub use sender::{EmailSender, SendError};
pub use smtp::SmtpEmailSender;

use std::sync::Arc;

use crate::config::EmailConfig;

/// Create the sender selected by `email.provider`.
pub fn create_email_sender(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, SendError> {
    match config.provider.as_str() {
        "smtp" => Ok(Arc::new(SmtpEmailSender::new(config.clone())?)),
        "log" => {
            tracing::warn!("Using log email sender, notifications will not be delivered");
            Ok(Arc::new(LogEmailSender::new(config.clone())?))
        }
        other => Err(SendError::Config(format!("unknown email provider '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_selection() {
        let smtp = create_email_sender(&EmailConfig::default()).unwrap();
        assert_eq!(smtp.name(), "smtp");

        let log = create_email_sender(&EmailConfig {
            provider: "log".into(),
            ..EmailConfig::default()
        })
        .unwrap();
        assert_eq!(log.name(), "log");
    }

    #[test]
    fn test_unknown_provider() {
        let result = create_email_sender(&EmailConfig {
            provider: "carrier-pigeon".into(),
            ..EmailConfig::default()
        });
        assert!(matches!(result, Err(SendError::Config(_))));
    }
}
