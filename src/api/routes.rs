use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::metrics::Metrics;
use crate::server::AppState;

use super::health::health;
use super::login::login;
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Login
        .route("/login", post(login))
        .route("/api/auth/login", post(login))
        // Health
        .route("/health", get(health))
        .route("/api/health", get(health))
}

/// Routes served on the metrics listener of both binaries.
pub fn metrics_routes() -> Router<Arc<Metrics>> {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/health", get(health))
}
