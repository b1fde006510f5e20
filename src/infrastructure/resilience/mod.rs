//! Failure isolation shared by the storage and queue adapters.
//!
//! - `CircuitBreaker`: fails fast while a backend is known to be down
//! - `ExponentialBackoff`: paces retries of the worker's receive loop

mod backoff;
mod circuit_breaker;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
