//! Liveness endpoint.

use axum::Json;
use chrono::Utc;

use super::models::HealthResponse;

/// GET /health - always healthy while the process serves requests.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Healthy".to_string(),
        timestamp: Utc::now(),
    })
}
