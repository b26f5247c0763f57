//! Circuit breaking: per-operation-key failure isolation
//!
//! A breaker opens after repeated failures inside a rolling window, rejects
//! while open, allows a trial after a cooldown, and closes again on enough
//! consecutive trial successes.

#[allow(clippy::module_inception)]
mod breaker;
mod registry;
mod types;

pub use breaker::CircuitBreaker;
pub use registry::CircuitBreakerRegistry;
pub use types::{CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
