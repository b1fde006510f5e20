//! Login notification email content, rendered with Handlebars.
//!
//! The HTML body relies on Handlebars' default escaping; the plain-text body
//! uses triple-stash placeholders so addresses are written as given.

use handlebars::Handlebars;
use serde_json::json;

use crate::config::EmailConfig;
use crate::dispatch::{DispatchMessage, NotificationKind};

use super::sender::SendError;

const LOGIN_HTML: &str = "login.html";
const LOGIN_TEXT: &str = "login.txt";

const LOGIN_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <p>Hello,</p>
    <p>A login to your account (<strong>{{email}}</strong>) was recorded at {{login_time}}.</p>
    <p>If this was you, no action is needed. If not, please secure your account.</p>
    <p>{{from_name}}</p>
</body>
</html>"#;

const LOGIN_TEXT_TEMPLATE: &str = r#"Hello,

A login to your account ({{{email}}}) was recorded at {{{login_time}}}.

If this was you, no action is needed. If not, please secure your account.

{{{from_name}}}"#;

#[derive(Debug, Clone)]
pub struct EmailContent {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Template engine with the notification templates registered.
pub struct EmailTemplates {
    handlebars: Handlebars<'static>,
    config: EmailConfig,
}

impl EmailTemplates {
    pub fn new(config: EmailConfig) -> Result<Self, SendError> {
        let mut handlebars = Handlebars::new();
        // A missing context field is a bug, not an empty string
        handlebars.set_strict_mode(true);

        for (name, template) in [(LOGIN_HTML, LOGIN_HTML_TEMPLATE), (LOGIN_TEXT, LOGIN_TEXT_TEMPLATE)] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| SendError::Template(format!("Failed to register {}: {}", name, e)))?;
        }

        Ok(Self { handlebars, config })
    }

    pub fn render(&self, message: &DispatchMessage) -> Result<EmailContent, SendError> {
        let (html, text) = match message.kind {
            NotificationKind::Login => (LOGIN_HTML, LOGIN_TEXT),
        };

        let context = json!({
            "email": message.email,
            "login_time": message.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "from_name": self.config.from_name,
        });

        let render = |name: &str| {
            self.handlebars
                .render(name, &context)
                .map_err(|e| SendError::Template(format!("Failed to render {}: {}", name, e)))
        };

        Ok(EmailContent {
            to: message.email.clone(),
            subject: self.config.subject.clone(),
            text_body: render(text)?,
            html_body: render(html)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn templates() -> EmailTemplates {
        EmailTemplates::new(EmailConfig::default()).unwrap()
    }

    fn login_at_half_past_ten(email: &str) -> DispatchMessage {
        DispatchMessage {
            email: email.into(),
            kind: NotificationKind::Login,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_login_content() {
        let content = templates().render(&login_at_half_past_ten("a@x.io")).unwrap();

        assert_eq!(content.to, "a@x.io");
        assert_eq!(content.subject, "New login to your account");
        assert!(content.text_body.contains("(a@x.io) was recorded at 2024-05-01 10:30:00 UTC"));
        assert!(content.text_body.ends_with("Email Service"));
        assert!(content.html_body.contains("<strong>a@x.io</strong>"));
        assert!(content.html_body.contains("<p>Email Service</p>"));
    }

    #[test]
    fn test_html_body_escapes_markup() {
        let templates = EmailTemplates::new(EmailConfig {
            from_name: "Ops & <Security>".into(),
            ..EmailConfig::default()
        })
        .unwrap();

        let content = templates.render(&login_at_half_past_ten("<b>x</b>@x.io")).unwrap();

        assert!(content.html_body.contains("&lt;b&gt;x&lt;/b&gt;@x.io"));
        assert!(content.html_body.contains("Ops &amp; &lt;Security&gt;"));
        assert!(!content.html_body.contains("<b>x</b>"));

        // Plain text is not HTML and keeps the raw characters
        assert!(content.text_body.contains("(<b>x</b>@x.io)"));
        assert!(content.text_body.ends_with("Ops & <Security>"));
    }
}
