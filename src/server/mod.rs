//! HTTP server assembly.

mod app;
mod middleware;
mod state;

pub use app::{create_app, create_metrics_app};
pub use middleware::track_request_duration;
pub use state::AppState;
