//! API layer - HTTP endpoint handlers.

mod health;
mod login;
mod metrics;
mod models;
mod routes;

pub use health::health;
pub use login::login;
pub use metrics::prometheus_metrics;
pub use models::{ApiResponse, HealthResponse, LoginRequest};
pub use routes::{api_routes, metrics_routes};
