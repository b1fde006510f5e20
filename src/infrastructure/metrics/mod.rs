//! Prometheus metrics for the login notification pipeline.
//!
//! Each process builds one [`Metrics`] value around its own [`Registry`] and
//! shares it by `Arc` with every component that records. The API registers
//! the `email_service_*` collectors, the worker the `email_worker_*` ones:
//! - Login attempt outcomes (invalid / success / error)
//! - Emails queued
//! - Storage operations and query latency
//! - HTTP request latency by endpoint and method
//! - Worker liveness and per-message outcomes
//!
//! Metric names are kept stable for existing dashboards.

mod helpers;

pub use helpers::{LoginOutcome, WorkerOutcome};

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

/// Prefix for ingress-side metrics
const SERVICE_PREFIX: &str = "email_service";

/// Prefix for worker-side metrics
const WORKER_PREFIX: &str = "email_worker";

/// Process-scoped metric collectors.
pub struct Metrics {
    registry: Registry,

    /// Login attempts by outcome (`status` = invalid | success | error)
    pub login_attempts: IntCounterVec,

    /// Dispatch messages published to the queue
    pub emails_queued: IntCounter,

    /// Storage operations by `operation` and `status`
    pub database_operations: IntCounterVec,

    /// HTTP request duration by `endpoint` and `method`
    pub request_duration: HistogramVec,

    /// Storage query duration by `operation`
    pub database_query_duration: HistogramVec,

    /// Worker liveness (1 = up, 0 = down)
    pub worker_health: IntGauge,

    /// Messages handled by the worker, by `status`
    pub worker_messages: IntCounterVec,

    /// Failed queue receive calls
    pub worker_receive_errors: IntCounter,

    /// Email transport call duration
    pub worker_send_duration: Histogram,
}

/// Which process a [`Metrics`] value serves. Only that process's
/// collectors are registered, so a scrape never reports the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsRole {
    /// Ingress API: `email_service_*`
    Api,
    /// Queue consumer: `email_worker_*`
    Worker,
}

impl Metrics {
    pub fn for_api() -> Result<Self, prometheus::Error> {
        Self::with_role(MetricsRole::Api)
    }

    pub fn for_worker() -> Result<Self, prometheus::Error> {
        Self::with_role(MetricsRole::Worker)
    }

    /// Create all collectors and register the ones owned by `role` in a
    /// fresh registry. The others still accept updates but are never exported.
    pub fn with_role(role: MetricsRole) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                format!("{}_login_attempts_total", SERVICE_PREFIX),
                "Total number of login attempts",
            ),
            &["status"],
        )?;

        let emails_queued = IntCounter::new(
            format!("{}_emails_queued_total", SERVICE_PREFIX),
            "Total number of emails queued",
        )?;

        let database_operations = IntCounterVec::new(
            Opts::new(
                format!("{}_database_operations_total", SERVICE_PREFIX),
                "Total database operations",
            ),
            &["operation", "status"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{}_request_duration_seconds", SERVICE_PREFIX),
                "Request duration in seconds",
            ),
            &["endpoint", "method"],
        )?;

        let database_query_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{}_database_query_duration_seconds", SERVICE_PREFIX),
                "Database query duration in seconds",
            ),
            &["operation"],
        )?;

        let worker_health = IntGauge::new(
            format!("{}_health", WORKER_PREFIX),
            "Worker liveness (1=up, 0=down)",
        )?;

        let worker_messages = IntCounterVec::new(
            Opts::new(
                format!("{}_messages_total", WORKER_PREFIX),
                "Total queue messages handled by the worker",
            ),
            &["status"],
        )?;

        let worker_receive_errors = IntCounter::new(
            format!("{}_receive_errors_total", WORKER_PREFIX),
            "Total failed queue receive calls",
        )?;

        let worker_send_duration = Histogram::with_opts(
            HistogramOpts::new(
                format!("{}_send_duration_seconds", WORKER_PREFIX),
                "Email transport call duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        match role {
            MetricsRole::Api => {
                registry.register(Box::new(login_attempts.clone()))?;
                registry.register(Box::new(emails_queued.clone()))?;
                registry.register(Box::new(database_operations.clone()))?;
                registry.register(Box::new(request_duration.clone()))?;
                registry.register(Box::new(database_query_duration.clone()))?;
            }
            MetricsRole::Worker => {
                registry.register(Box::new(worker_health.clone()))?;
                registry.register(Box::new(worker_messages.clone()))?;
                registry.register(Box::new(worker_receive_errors.clone()))?;
                registry.register(Box::new(worker_send_duration.clone()))?;
            }
        }

        Ok(Self {
            registry,
            login_attempts,
            emails_queued,
            database_operations,
            request_duration,
            database_query_duration,
            worker_health,
            worker_messages,
            worker_receive_errors,
            worker_send_duration,
        })
    }

    /// The registry backing these collectors.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
