//! Cross-provider fallback chains
//!
//! A chain maps a primary provider to the ordered alternates tried when it
//! fails. Individual failures are never swallowed: every attempted provider
//! and its failure message appear in the aggregated error when the whole
//! chain is exhausted.

use crate::error::{ErrorKind, ProviderError, Result};
use crate::provider::ProviderType;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Callback fired when an attempt falls back from one provider to the next
pub type FallbackHook = Box<dyn Fn(ProviderType, ProviderType) + Send + Sync>;

/// Tuning for one fallback execution
pub struct FallbackOptions {
    /// Total providers to try, the primary included
    pub max_attempts: usize,
    /// Pause between attempts
    pub delay_ms: u64,
    /// Observer invoked with (failed, next) before each fallback attempt
    pub on_fallback: Option<FallbackHook>,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 0,
            on_fallback: None,
        }
    }
}

impl std::fmt::Debug for FallbackOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOptions")
            .field("max_attempts", &self.max_attempts)
            .field("delay_ms", &self.delay_ms)
            .field("on_fallback", &self.on_fallback.is_some())
            .finish()
    }
}

/// Runs an operation against a provider chain until one succeeds
#[derive(Debug, Default)]
pub struct FallbackChainExecutor {
    chains: DashMap<ProviderType, Vec<ProviderType>>,
    stats: DashMap<String, u64>,
}

impl FallbackChainExecutor {
    /// Create an executor with no chains configured
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the alternates tried after `primary` fails
    ///
    /// The primary is silently filtered out of its own chain, as are
    /// duplicate entries.
    pub fn set_chain(&self, primary: ProviderType, chain: Vec<ProviderType>) {
        let mut filtered = Vec::with_capacity(chain.len());
        for provider in chain {
            if provider != primary && !filtered.contains(&provider) {
                filtered.push(provider);
            }
        }
        self.chains.insert(primary, filtered);
    }

    /// The configured chain for a primary, primary excluded
    pub fn chain(&self, primary: ProviderType) -> Vec<ProviderType> {
        self.chains
            .get(&primary)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// How often each "from->to" fallback succeeded
    pub fn stats(&self) -> HashMap<String, u64> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Try `op` against the primary, then its chain, until one succeeds
    ///
    /// The attempt sequence is `[primary, ...chain]` truncated to
    /// `max_attempts`. When every attempt fails the returned error is a
    /// single `Overloaded` aggregate listing each provider and its message.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        primary: ProviderType,
        mut op: F,
        options: FallbackOptions,
    ) -> Result<T>
    where
        F: FnMut(ProviderType) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut sequence = vec![primary];
        sequence.extend(self.chain(primary));
        sequence.truncate(options.max_attempts.max(1));

        let mut failures: Vec<(ProviderType, String)> = Vec::new();
        for (index, &provider) in sequence.iter().enumerate() {
            if index > 0 {
                let from = sequence[index - 1];
                if let Some(hook) = &options.on_fallback {
                    hook(from, provider);
                }
                if options.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
                }
                info!(from = %from, to = %provider, "falling back to next provider");
            }
            match op(provider).await {
                Ok(value) => {
                    if index > 0 {
                        let key = format!("{}->{}", sequence[index - 1], provider);
                        *self.stats.entry(key).or_insert(0) += 1;
                    }
                    return Ok(value);
                }
                Err(err) if err.kind == ErrorKind::StreamInterrupted && !err.retryable => {
                    // cancellation must not trigger another provider
                    return Err(err);
                }
                Err(err) => {
                    warn!(provider = %provider, error = %err, "fallback attempt failed");
                    failures.push((provider, err.message.clone()));
                }
            }
        }

        let attempted: Vec<&str> = failures.iter().map(|(p, _)| p.as_str()).collect();
        let mut aggregate = ProviderError::new(
            ErrorKind::Overloaded,
            format!("all providers failed: {}", attempted.join(", ")),
        )
        .with_retryable(false)
        .with_context("attempted_providers", attempted.join(","));
        for (provider, message) in &failures {
            aggregate = aggregate.with_context(format!("failure:{provider}"), message.clone());
        }
        Err(aggregate)
    }
}
