//! Per-key failure isolation state machine

use super::types::{CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
use crate::error::{ErrorKind, ProviderError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    failure_timestamps: VecDeque<Instant>,
    next_attempt_at: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            failure_timestamps: VecDeque::new(),
            next_attempt_at: None,
        }
    }
}

/// Circuit breaker for one operation key
///
/// Opens after `failure_threshold` failures within the rolling monitoring
/// window, rejects while open, allows a trial after `timeout`, and closes
/// again after `success_threshold` consecutive trial successes. All counter
/// mutations happen under one lock, so concurrent callers observe consistent
/// transitions.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the given operation key
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// The operation key this breaker guards
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run `op` under breaker protection
    ///
    /// While open and before the reset time, fails fast with an `Overloaded`
    /// error carrying the remaining wait in seconds; the rejected call does
    /// not count toward breaker statistics. Otherwise the operation's result
    /// is propagated unchanged after updating the counters.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.before_attempt()?;

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Fail fast if the breaker is open, transitioning to half-open when due
    fn before_attempt(&self) -> Result<()> {
        let mut state = self.inner.lock();
        if state.state != CircuitState::Open {
            return Ok(());
        }

        // open circuits always carry a reset time; a missing one means the
        // reset is due
        let now = Instant::now();
        let next_attempt_at = state.next_attempt_at.unwrap_or(now);
        if now < next_attempt_at {
            let remaining = next_attempt_at - now;
            return Err(ProviderError::new(
                ErrorKind::Overloaded,
                format!(
                    "circuit breaker '{}' is open; retry in {}s",
                    self.key,
                    remaining.as_secs().max(1)
                ),
            )
            .with_retry_after(remaining.as_secs().max(1))
            .with_context("circuit", "open"));
        }

        debug!(key = %self.key, "circuit breaker half-open, allowing trial");
        state.state = CircuitState::HalfOpen;
        state.consecutive_successes = 0;
        Ok(())
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.inner.lock();
        state.consecutive_failures = 0;
        if state.state == CircuitState::HalfOpen {
            state.consecutive_successes += 1;
            if state.consecutive_successes >= self.config.success_threshold {
                debug!(key = %self.key, "circuit breaker closed after successful trials");
                *state = BreakerState::new();
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.inner.lock();
        let now = Instant::now();

        state.consecutive_successes = 0;
        state.consecutive_failures += 1;
        state.failure_timestamps.push_back(now);
        let window_start = now - self.config.monitoring_period;
        while state
            .failure_timestamps
            .front()
            .is_some_and(|t| *t < window_start)
        {
            state.failure_timestamps.pop_front();
        }

        let should_open = match state.state {
            // any half-open failure reopens immediately
            CircuitState::HalfOpen => true,
            CircuitState::Closed => {
                state.failure_timestamps.len() as u32 >= self.config.failure_threshold
            }
            CircuitState::Open => false,
        };

        if should_open {
            state.state = CircuitState::Open;
            state.next_attempt_at = Some(now + self.config.timeout);
            warn!(
                key = %self.key,
                window_failures = state.failure_timestamps.len(),
                reset_in_secs = self.config.timeout.as_secs(),
                "circuit breaker opened"
            );
        }
    }

    /// Whether a request would currently be allowed through
    pub fn is_allowing_requests(&self) -> bool {
        let state = self.inner.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => state
                .next_attempt_at
                .is_some_and(|at| Instant::now() >= at),
        }
    }

    /// The current state, without side effects
    pub fn current_state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Diagnostic snapshot
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.inner.lock();
        CircuitBreakerSnapshot {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            window_failures: state.failure_timestamps.len() as u32,
            next_attempt_in: state
                .next_attempt_at
                .and_then(|at| at.checked_duration_since(Instant::now())),
        }
    }

    /// Force the breaker closed and zero all counters
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        *state = BreakerState::new();
        debug!(key = %self.key, "circuit breaker reset");
    }
}
