//! Metrics helper methods for convenient metric recording

use prometheus::{Encoder, HistogramTimer, TextEncoder};

use super::Metrics;

/// Overall outcome of a login request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Invalid,
    Success,
    Error,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Invalid => "invalid",
            LoginOutcome::Success => "success",
            LoginOutcome::Error => "error",
        }
    }
}

/// Per-message outcome inside the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Email sent and message acknowledged
    Sent,
    /// Transport failed or timed out; left for redelivery
    SendFailed,
    /// Body did not match the wire schema; left for redelivery
    Invalid,
}

impl WorkerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerOutcome::Sent => "sent",
            WorkerOutcome::SendFailed => "send_failed",
            WorkerOutcome::Invalid => "invalid",
        }
    }
}

impl Metrics {
    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry().gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }

    pub fn record_login(&self, outcome: LoginOutcome) {
        self.login_attempts
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record a storage operation (`insert`, `update`, `unknown`, ...)
    pub fn record_storage_op(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.database_operations
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Start a storage query timer; the duration is observed when it drops
    pub fn start_query_timer(&self, operation: &str) -> HistogramTimer {
        self.database_query_duration
            .with_label_values(&[operation])
            .start_timer()
    }

    pub fn observe_request(&self, endpoint: &str, method: &str, seconds: f64) {
        self.request_duration
            .with_label_values(&[endpoint, method])
            .observe(seconds);
    }

    pub fn worker_up(&self) {
        self.worker_health.set(1);
    }

    pub fn worker_down(&self) {
        self.worker_health.set(0);
    }

    pub fn record_worker_message(&self, outcome: WorkerOutcome) {
        self.worker_messages
            .with_label_values(&[outcome.as_str()])
            .inc();
    }
}
