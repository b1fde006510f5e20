// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::redis;
pub use infrastructure::resilience;

// Domain layer (business logic)
pub mod attempts;
pub mod dispatch;
pub mod email;
pub mod ingress;
pub mod queue;
pub mod worker;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod telemetry;
