//! Circuit breaker guarding the storage and queue backends

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::config::{DatabaseConfig, RedisConfig};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow through normally
    Closed = 0,
    /// Calls are rejected without touching the backend
    Open = 1,
    /// Probe calls are allowed to test recovery
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Successful probes in half-open before closing
    pub success_threshold: u32,
    /// How long the circuit stays open before probing
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&DatabaseConfig> for CircuitBreakerConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_failure_threshold,
            success_threshold: config.circuit_breaker_success_threshold,
            reset_timeout: Duration::from_secs(config.circuit_breaker_reset_timeout_seconds),
        }
    }
}

impl From<&RedisConfig> for CircuitBreakerConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_failure_threshold,
            success_threshold: config.circuit_breaker_success_threshold,
            reset_timeout: Duration::from_secs(config.circuit_breaker_reset_timeout_seconds),
        }
    }
}

/// Lock-free circuit breaker.
///
/// Timestamps are kept as milliseconds since the breaker's creation on the
/// monotonic clock, so wall-clock jumps never reopen or close the circuit.
pub struct CircuitBreaker {
    name: &'static str,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_state_change_ms: AtomicU64,
    origin: Instant,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: &'static str) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_state_change_ms: AtomicU64::new(0),
            origin: Instant::now(),
            config,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Current state, moving Open to HalfOpen once the reset timeout passed
    pub fn state(&self) -> CircuitState {
        self.maybe_half_open();
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn allow_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed);
                    tracing::info!(breaker = self.name, "Circuit breaker closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to(CircuitState::Open);
                    tracing::warn!(
                        breaker = self.name,
                        failures = failures,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open);
                tracing::warn!(breaker = self.name, "Circuit breaker reopened by failed probe");
            }
            CircuitState::Open => {
                self.last_state_change_ms
                    .store(self.now_ms(), Ordering::Release);
            }
        }
    }

    fn maybe_half_open(&self) {
        if CircuitState::from(self.state.load(Ordering::Acquire)) != CircuitState::Open {
            return;
        }

        let elapsed = self
            .now_ms()
            .saturating_sub(self.last_state_change_ms.load(Ordering::Acquire));
        if elapsed < self.config.reset_timeout.as_millis() as u64 {
            return;
        }

        if self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.success_count.store(0, Ordering::Release);
            self.last_state_change_ms
                .store(self.now_ms(), Ordering::Release);
            tracing::info!(breaker = self.name, "Circuit breaker half-open, probing");
        }
    }

    fn transition_to(&self, new_state: CircuitState) {
        self.state.store(new_state as u8, Ordering::Release);
        self.last_state_change_ms
            .store(self.now_ms(), Ordering::Release);
        self.success_count.store(0, Ordering::Release);
        if new_state == CircuitState::Closed {
            self.failure_count.store(0, Ordering::Release);
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Acquire),
            success_count: self.success_count.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failures: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: failures,
                success_threshold: 2,
                reset_timeout: Duration::from_millis(reset_ms),
            },
        )
    }

    #[test]
    fn test_database_and_redis_tuning_are_separate() {
        let database = DatabaseConfig {
            circuit_breaker_failure_threshold: 9,
            circuit_breaker_reset_timeout_seconds: 120,
            ..DatabaseConfig::default()
        };
        let redis = RedisConfig {
            circuit_breaker_failure_threshold: 2,
            ..RedisConfig::default()
        };

        let db_config = CircuitBreakerConfig::from(&database);
        let redis_config = CircuitBreakerConfig::from(&redis);

        assert_eq!(db_config.failure_threshold, 9);
        assert_eq!(db_config.reset_timeout, Duration::from_secs(120));
        assert_eq!(redis_config.failure_threshold, 2);
        assert_eq!(redis_config.reset_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::new("storage");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        assert_eq!(cb.name(), "storage");
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, 1000);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let cb = breaker(3, 1000);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recovers_through_half_open() {
        let cb = breaker(1, 10);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = breaker(1, 10);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(
            CircuitState::from(cb.state.load(Ordering::Acquire)),
            CircuitState::Open
        );
    }

    #[test]
    fn test_config_from_redis_settings() {
        let redis = RedisConfig::default();
        let config = CircuitBreakerConfig::from(&redis);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
    }
}
