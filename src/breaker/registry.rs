//! Lazy per-key breaker registry

use super::breaker::CircuitBreaker;
use super::types::{CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
use crate::error::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// Shared registry of independent circuit breakers
///
/// One breaker exists per operation key (e.g. `provider:openai:stream`),
/// created lazily on first use. Breakers never share state; the registry is
/// safe to use from any number of in-flight conversations.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers use the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// The breaker for `key`, creating it closed if absent
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.clone())))
            .clone()
    }

    /// Run `op` under the breaker registered for `key`
    pub async fn execute<T, F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.breaker(key).execute(op).await
    }

    /// State of the breaker for `key`; unknown keys read as closed
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers
            .get(key)
            .map(|b| b.current_state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Force the breaker for `key` closed; no-op for unknown keys
    pub fn reset(&self, key: &str) {
        if let Some(breaker) = self.breakers.get(key) {
            breaker.reset();
        }
    }

    /// Snapshot every known breaker, for diagnostics
    pub fn snapshots(&self) -> Vec<(String, CircuitBreakerSnapshot)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ProviderError};
    use std::time::Duration;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_breakers_are_independent() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..2 {
            let _: Result<()> = registry
                .execute("provider:openai", || async {
                    Err(ProviderError::new(ErrorKind::Internal, "down"))
                })
                .await;
        }

        assert_eq!(registry.state("provider:openai"), CircuitState::Open);
        assert_eq!(registry.state("provider:anthropic"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_instance_is_shared_per_key() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        let a = registry.breaker("k");
        let b = registry.breaker("k");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_reset_by_key() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..2 {
            let _: Result<()> = registry
                .execute("k", || async {
                    Err(ProviderError::new(ErrorKind::Internal, "down"))
                })
                .await;
        }
        assert_eq!(registry.state("k"), CircuitState::Open);

        registry.reset("k");
        assert_eq!(registry.state("k"), CircuitState::Closed);
        // resetting an unknown key is harmless
        registry.reset("unknown");
    }

    #[tokio::test]
    async fn test_concurrent_lazy_creation() {
        let registry = Arc::new(CircuitBreakerRegistry::default());
        let mut handles = vec![];
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.execute("shared", || async { Ok(1u32) }).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(registry.snapshots().len(), 1);
    }
}
