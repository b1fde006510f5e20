//! Login endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::AppError;
use crate::ingress::QUEUED_MESSAGE;
use crate::server::AppState;

use super::models::{ApiResponse, LoginRequest};

/// POST /login - record a login attempt and queue its notification email.
///
/// A body that is not a JSON object with an `Email` string is handled as an
/// empty email, so the client gets the usual validation response.
#[tracing::instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unreadable login body");
            LoginRequest::default()
        }
    };

    state.login.record_login(request.email()).await?;

    Ok(Json(ApiResponse::ok(QUEUED_MESSAGE)))
}
