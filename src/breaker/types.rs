//! Circuit breaker states and configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected until the reset timeout elapses
    Open,
    /// A limited trial of requests is allowed
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within the monitoring window that open the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,
    /// How long an open circuit rejects before allowing a trial
    pub timeout: Duration,
    /// Rolling window over which failures are counted
    pub monitoring_period: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of one breaker, for diagnostics
#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Successes since the last failure (meaningful in half-open)
    pub consecutive_successes: u32,
    /// Failures currently inside the rolling window
    pub window_failures: u32,
    /// Time until an open circuit allows a trial, if open
    pub next_attempt_in: Option<Duration>,
}
