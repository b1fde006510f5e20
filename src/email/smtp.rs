//! SMTP sender built on lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::dispatch::DispatchMessage;

use super::content::{EmailContent, EmailTemplates};
use super::sender::{EmailSender, SendError};

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    templates: EmailTemplates,
}

impl SmtpEmailSender {
    pub fn new(config: EmailConfig) -> Result<Self, SendError> {
        let from = parse_mailbox(&format!("{} <{}>", config.from_name, config.from_address))?;
        let transport = build_transport(&config)?;

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = config.smtp_tls,
            "SMTP sender configured"
        );

        Ok(Self {
            transport,
            from,
            templates: EmailTemplates::new(config)?,
        })
    }

    fn build_message(&self, content: &EmailContent) -> Result<Message, SendError> {
        let to = parse_mailbox(&content.to)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html_body.clone()),
                    ),
            )
            .map_err(|e| SendError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address.parse().map_err(|e: lettre::address::AddressError| SendError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn build_transport(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
    let mut builder = if config.smtp_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| SendError::Config(format!("Failed to create SMTP relay: {}", e)))?
    } else {
        // Plain connection for local relays such as Mailpit
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    }
    .port(config.smtp_port);

    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &DispatchMessage) -> Result<(), SendError> {
        let content = self.templates.render(message)?;
        let email = self.build_message(&content)?;

        let response = self.transport.send(email).await.map_err(|e| {
            tracing::error!(to = %content.to, error = %e, "SMTP send failed");
            SendError::Transport(e.to_string())
        })?;

        tracing::info!(
            to = %content.to,
            code = %response.code(),
            "Login notification sent via SMTP"
        );
        Ok(())
    }
}
