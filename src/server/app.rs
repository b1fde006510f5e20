use std::sync::Arc;

use axum::{http::HeaderValue, middleware::from_fn_with_state, Router};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::{api_routes, metrics_routes};
use crate::metrics::Metrics;

use super::middleware::track_request_duration;
use super::AppState;

/// Login requests carry a single address; anything larger is refused.
const MAX_BODY_BYTES: usize = 16 * 1024;

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.server.cors_origins);

    Router::new()
        .merge(api_routes())
        .route_layer(from_fn_with_state(
            state.metrics.clone(),
            track_request_duration,
        ))
        // Add middleware
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router for the standalone metrics listener.
pub fn create_metrics_app(metrics: Arc<Metrics>) -> Router {
    metrics_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Any origin when none are configured; otherwise the listed origins with
/// credentials allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
