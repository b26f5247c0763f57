//! Retry with exponential backoff and jitter
//!
//! Transient provider failures are retried locally before they escalate to
//! the fallback chain. Provider-supplied retry-after hints take precedence
//! over the computed backoff.

use crate::cancel::CancelHandle;
use crate::error::{ErrorKind, ProviderError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (3 means up to 4 attempts total)
    pub max_retries: u32,
    /// First backoff delay
    pub base_delay_ms: u64,
    /// Upper bound on any delay, jitter included
    pub max_delay_ms: u64,
    /// Jitter amplitude as a fraction of the computed delay (0.1 = ±10%)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 32_000,
            jitter_factor: 0.1,
        }
    }
}

/// Executes operations with retry, backoff, and rate limit awareness
#[derive(Debug, Clone, Default)]
pub struct RateLimitRetrier {
    config: RetryConfig,
}

impl RateLimitRetrier {
    /// Create a retrier with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op`, retrying retryable failures up to `max_retries` times
    ///
    /// Attempts are strictly sequential. Non-retryable errors and exhausted
    /// budgets return the last error annotated with the attempt count and
    /// `label`.
    pub async fn execute_with_retry<T, F, Fut>(&self, op: F, label: &str) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_cancellable(op, label, None).await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but stops
    /// scheduling new attempts once `cancel` is raised
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        mut op: F,
        label: &str,
        cancel: Option<&CancelHandle>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(label, attempt = attempt + 1, "retry succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !err.retryable || attempt >= self.config.max_retries {
                        if err.retryable {
                            warn!(label, attempts = attempt + 1, kind = %err.kind, "retry budget exhausted");
                        }
                        return Err(err
                            .with_context("attempts", (attempt + 1).to_string())
                            .with_context("retry_label", label));
                    }

                    let delay = match err.retry_after_seconds {
                        Some(secs) => Duration::from_secs(secs),
                        None => self.calculate_backoff_delay(attempt),
                    };
                    debug!(
                        label,
                        attempt = attempt + 1,
                        kind = %err.kind,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );

                    match cancel {
                        Some(handle) => {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = handle.cancelled() => {
                                    return Err(ProviderError::new(
                                        ErrorKind::StreamInterrupted,
                                        "cancelled while waiting to retry",
                                    )
                                    .with_retryable(false)
                                    .with_context("retry_label", label));
                                }
                            }
                        }
                        None => tokio::time::sleep(delay).await,
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff delay for the given zero-based attempt index
    ///
    /// `min(base * 2^attempt, max)`, jittered by ±`jitter_factor`, floored at
    /// zero, and clamped back to `max_delay_ms` so the cap holds even after
    /// positive jitter.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exponential =
            (self.config.base_delay_ms as f64) * 2f64.powi(attempt.min(63) as i32);
        let capped = exponential.min(self.config.max_delay_ms as f64);

        let jittered = if self.config.jitter_factor > 0.0 {
            let jitter = capped * self.config.jitter_factor * rand::thread_rng().gen_range(-1.0..=1.0);
            capped + jitter
        } else {
            capped
        };

        Duration::from_millis(jittered.clamp(0.0, self.config.max_delay_ms as f64) as u64)
    }
}
