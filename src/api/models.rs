//! Request and response bodies.
//!
//! Field names are PascalCase on the wire. The login body also accepts a
//! lowercase `email` key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "Email", alias = "email", default)]
    pub email: Option<String>,
}

impl LoginRequest {
    /// The submitted email, empty when missing or null.
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn rejected(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: Some(errors),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_field_names() {
        let pascal: LoginRequest = serde_json::from_str(r#"{"Email":"a@x.io"}"#).unwrap();
        assert_eq!(pascal.email(), "a@x.io");

        let lower: LoginRequest = serde_json::from_str(r#"{"email":"b@x.io"}"#).unwrap();
        assert_eq!(lower.email(), "b@x.io");
    }

    #[test]
    fn test_login_request_missing_or_null_email() {
        let missing: LoginRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.email(), "");

        let null: LoginRequest = serde_json::from_str(r#"{"Email":null}"#).unwrap();
        assert_eq!(null.email(), "");
    }

    #[test]
    fn test_success_response_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::<()>::ok("Email queued for sending")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Success": true, "Message": "Email queued for sending"})
        );
    }

    #[test]
    fn test_rejected_response_lists_errors() {
        let body = serde_json::to_value(ApiResponse::<()>::rejected(
            "Invalid email format",
            vec!["Error 1".into(), "Error 2".into()],
        ))
        .unwrap();
        assert_eq!(body["Success"], false);
        assert_eq!(body["Errors"], serde_json::json!(["Error 1", "Error 2"]));
    }
}
