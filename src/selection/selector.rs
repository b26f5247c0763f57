//! The strategy cascade

use super::context::SelectionContext;
use super::strategies::{
    ByAvailabilityStrategy, ByCapabilityStrategy, ByCostStrategy, ByNameStrategy,
};
use super::strategy::SelectionStrategy;
use crate::breaker::CircuitBreakerRegistry;
use crate::catalog::ModelRegistry;
use crate::error::{ErrorKind, ProviderError, Result};
use crate::preferences::ProviderPreferenceStore;
use crate::provider::{ProviderFactory, ProviderType};
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks one provider per request by running the strategy cascade
///
/// Strategies are tried in descending priority; the first that can handle the
/// enriched context and returns a provider wins. When every strategy declines,
/// the selector falls back to the system default and finally to the first
/// available provider. Selection fails only when no provider is registered.
pub struct ProviderSelector {
    factory: Arc<ProviderFactory>,
    preferences: Arc<ProviderPreferenceStore>,
    strategies: Vec<Arc<dyn SelectionStrategy>>,
}

impl ProviderSelector {
    /// Build a selector with the four built-in strategies installed
    pub fn new(
        factory: Arc<ProviderFactory>,
        registry: Arc<ModelRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        preferences: Arc<ProviderPreferenceStore>,
    ) -> Self {
        let mut selector = Self {
            factory: factory.clone(),
            preferences,
            strategies: Vec::new(),
        };
        selector.add_strategy(Arc::new(ByNameStrategy::new(registry)));
        selector.add_strategy(Arc::new(ByCapabilityStrategy::new(factory.clone())));
        selector.add_strategy(Arc::new(ByCostStrategy::new(factory)));
        selector.add_strategy(Arc::new(ByAvailabilityStrategy::new(breakers)));
        selector
    }

    /// Install an additional strategy, keeping the cascade priority-sorted
    pub fn add_strategy(&mut self, strategy: Arc<dyn SelectionStrategy>) {
        self.strategies.push(strategy);
        self.strategies
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Pick a provider for the given request context
    pub fn select_provider(&self, context: &SelectionContext) -> Result<ProviderType> {
        let available = self.factory.available();
        if available.is_empty() {
            return Err(ProviderError::new(
                ErrorKind::Validation,
                "no providers registered",
            ));
        }

        let context = self.enrich(context.clone());
        let candidates: Vec<ProviderType> = available
            .iter()
            .copied()
            .filter(|p| !context.excluded_providers.contains(p))
            .collect();

        if candidates.is_empty() {
            // every registered provider is excluded; selection must still
            // return something, so fall through to the raw available set
            warn!("all providers excluded, ignoring exclusions");
            return self.fallback(&available);
        }

        if let Some(kind) = context.strategy {
            if let Some(strategy) = self.strategies.iter().find(|s| s.kind() == kind) {
                if let Some(provider) = strategy.select(&candidates, &context) {
                    return Ok(provider);
                }
                debug!(strategy = ?kind, "forced strategy declined, using fallback");
            } else {
                warn!(strategy = ?kind, "requested strategy not installed");
            }
            return self.fallback(&candidates);
        }

        for strategy in &self.strategies {
            if !strategy.can_handle(&context) {
                continue;
            }
            if let Some(provider) = strategy.select(&candidates, &context) {
                return Ok(provider);
            }
        }
        self.fallback(&candidates)
    }

    /// Fill context gaps from the preference store; context values win
    fn enrich(&self, mut context: SelectionContext) -> SelectionContext {
        let Some(user_id) = context.user_id.clone() else {
            return context;
        };
        let Some(preference) = self
            .preferences
            .resolve(&user_id, context.conversation_id.as_deref())
        else {
            return context;
        };
        if context.preferred_provider.is_none() {
            context.preferred_provider = Some(preference.preferred_provider);
        }
        if context.model_id.is_none() {
            context.model_id = preference.preferred_model;
        }
        context
    }

    /// System default if usable, else the first candidate
    fn fallback(&self, candidates: &[ProviderType]) -> Result<ProviderType> {
        if let Some(default) = self.preferences.system_default() {
            if candidates.contains(&default) {
                debug!(provider = %default, "selected system default provider");
                return Ok(default);
            }
        }
        match candidates.first() {
            Some(&provider) => {
                debug!(provider = %provider, "selected first available provider");
                Ok(provider)
            }
            None => Err(ProviderError::new(
                ErrorKind::Validation,
                "no providers registered",
            )),
        }
    }
}
