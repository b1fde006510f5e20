use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::metrics::Metrics;

/// Observe request latency labelled by route template and method.
///
/// Installed as a route layer, so only matched routes are measured.
pub async fn track_request_duration(
    State(metrics): State<Arc<Metrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let method = req.method().to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    metrics.observe_request(&endpoint, &method, start.elapsed().as_secs_f64());

    response
}
