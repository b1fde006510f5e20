use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::api::ApiResponse;
use crate::attempts::StorageError;
use crate::queue::QueueError;

/// Generic client-facing message for every non-validation failure
pub const GENERIC_FAILURE_DETAIL: &str = "An unexpected error occurred";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {message}")]
    Validation { message: String, errors: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    /// Short machine-readable code used in logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Queue(_) => "QUEUE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// RFC 7807 problem payload returned for unexpected failures.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ProblemDetails {
    pub fn internal() -> Self {
        Self {
            problem_type: "https://tools.ietf.org/html/rfc9110#section-15.6.1".to_string(),
            title: "Internal server error".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: GENERIC_FAILURE_DETAIL.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Validation { message, errors } = self {
            tracing::debug!(message = %message, errors = ?errors, "Request rejected");
            let body: ApiResponse<()> = ApiResponse::rejected(message, errors);
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }

        // Detail stays server-side; the client only ever sees the generic problem
        tracing::error!(
            code = %self.code(),
            status = %StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message = %self,
            "API error"
        );

        let mut response =
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ProblemDetails::internal())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_validation_error_renders_bad_request() {
        let err = AppError::validation("Invalid email format", vec!["Email is required".into()]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["Success"], false);
        assert_eq!(json["Message"], "Invalid email format");
        assert_eq!(json["Errors"][0], "Email is required");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let err = AppError::Storage(StorageError::Unavailable("db password=hunter2".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("hunter2"));
        assert!(body.contains(GENERIC_FAILURE_DETAIL));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Internal("x".into()).code(), "INTERNAL_ERROR");
        assert_eq!(
            AppError::Queue(QueueError::Unavailable("down".into())).code(),
            "QUEUE_ERROR"
        );
    }
}
