//! Wire format of a queued notification request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of notification to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Login,
}

/// Queue message body:
/// `{"Email": "...", "Type": "Login", "Timestamp": "2024-01-01T00:00:00Z"}`.
///
/// Unknown fields and unknown `Type` values fail to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DispatchMessage {
    pub email: String,
    #[serde(rename = "Type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

impl DispatchMessage {
    pub fn login(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: NotificationKind::Login,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
