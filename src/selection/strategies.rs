//! The built-in selection strategies

use super::context::{SelectionContext, StrategyKind};
use super::strategy::SelectionStrategy;
use crate::breaker::{CircuitBreakerRegistry, CircuitState};
use crate::catalog::ModelRegistry;
use crate::provider::{ProviderFactory, ProviderType};
use std::sync::Arc;
use tracing::{debug, warn};

/// Breaker key for a provider, shared with the switchboard
pub(crate) fn breaker_key(provider: ProviderType) -> String {
    format!("provider:{}", provider.as_str())
}

/// Pick the provider the request names, via model id or explicit preference
pub struct ByNameStrategy {
    registry: Arc<ModelRegistry>,
}

impl ByNameStrategy {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

impl SelectionStrategy for ByNameStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ByName
    }

    fn can_handle(&self, context: &SelectionContext) -> bool {
        context.model_id.is_some() || context.preferred_provider.is_some()
    }

    fn priority(&self) -> u8 {
        100
    }

    fn select(
        &self,
        available: &[ProviderType],
        context: &SelectionContext,
    ) -> Option<ProviderType> {
        if let Some(model_id) = &context.model_id {
            if let Some(provider) = self.registry.resolve(model_id) {
                if available.contains(&provider) {
                    debug!(model_id = %model_id, provider = %provider, "selected provider by model id");
                    return Some(provider);
                }
                debug!(model_id = %model_id, provider = %provider, "model owner not available");
            }
        }
        if let Some(provider) = context.preferred_provider {
            if available.contains(&provider) {
                debug!(provider = %provider, "selected explicitly preferred provider");
                return Some(provider);
            }
        }
        None
    }
}

/// Pick the first provider whose model set satisfies the required capabilities
pub struct ByCapabilityStrategy {
    factory: Arc<ProviderFactory>,
}

impl ByCapabilityStrategy {
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        Self { factory }
    }
}

impl SelectionStrategy for ByCapabilityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ByCapability
    }

    fn can_handle(&self, context: &SelectionContext) -> bool {
        !context.required_capabilities.is_empty()
    }

    fn priority(&self) -> u8 {
        75
    }

    fn select(
        &self,
        available: &[ProviderType],
        context: &SelectionContext,
    ) -> Option<ProviderType> {
        // registration order makes ties deterministic
        for &provider in available {
            let instance = match self.factory.get_or_create(provider) {
                Ok(instance) => instance,
                Err(err) => {
                    debug!(provider = %provider, error = %err, "skipping uninstantiable provider");
                    continue;
                }
            };
            let qualifies = instance.available_models().iter().any(|model| {
                !model.deprecated
                    && context
                        .required_capabilities
                        .iter()
                        .all(|&cap| model.capabilities.supports(cap))
            });
            if qualifies {
                debug!(provider = %provider, "selected provider by capability");
                return Some(provider);
            }
        }
        None
    }
}

/// Pick the provider whose cheapest model minimizes the estimated cost
pub struct ByCostStrategy {
    factory: Arc<ProviderFactory>,
}

/// Token estimate assumed when the request gives none
const DEFAULT_ESTIMATED_TOKENS: u64 = 500;

impl ByCostStrategy {
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        Self { factory }
    }

    /// Cheapest non-deprecated model cost for one provider, in USD
    fn cheapest_cost(
        &self,
        provider: ProviderType,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Option<f64> {
        let instance = self.factory.get_or_create(provider).ok()?;
        instance
            .available_models()
            .iter()
            .filter(|model| !model.deprecated)
            .map(|model| model.pricing.estimate(input_tokens, output_tokens))
            .min_by(|a, b| a.total_cmp(b))
    }
}

impl SelectionStrategy for ByCostStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ByCost
    }

    fn can_handle(&self, context: &SelectionContext) -> bool {
        context.estimated_input_tokens.is_some()
            || context.estimated_output_tokens.is_some()
            || context.max_cost_per_token.is_some()
    }

    fn priority(&self) -> u8 {
        50
    }

    fn select(
        &self,
        available: &[ProviderType],
        context: &SelectionContext,
    ) -> Option<ProviderType> {
        let input_tokens = context
            .estimated_input_tokens
            .unwrap_or(DEFAULT_ESTIMATED_TOKENS);
        let output_tokens = context
            .estimated_output_tokens
            .unwrap_or(DEFAULT_ESTIMATED_TOKENS);
        let total_tokens = (input_tokens + output_tokens).max(1);

        let mut best: Option<(ProviderType, f64)> = None;
        for &provider in available {
            let Some(cost) = self.cheapest_cost(provider, input_tokens, output_tokens) else {
                continue;
            };
            if let Some(ceiling) = context.max_cost_per_token {
                let per_token = cost / total_tokens as f64;
                if per_token > ceiling {
                    debug!(
                        provider = %provider,
                        per_token,
                        ceiling,
                        "provider over the per-token cost ceiling"
                    );
                    continue;
                }
            }
            match best {
                Some((_, best_cost)) if best_cost <= cost => {}
                _ => best = Some((provider, cost)),
            }
        }
        if let Some((provider, cost)) = best {
            debug!(provider = %provider, estimated_cost_usd = cost, "selected cheapest provider");
            return Some(provider);
        }
        None
    }
}

/// Pick the healthiest provider according to its circuit breaker
pub struct ByAvailabilityStrategy {
    breakers: Arc<CircuitBreakerRegistry>,
}

impl ByAvailabilityStrategy {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { breakers }
    }
}

impl SelectionStrategy for ByAvailabilityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ByAvailability
    }

    fn can_handle(&self, _context: &SelectionContext) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        25
    }

    fn select(
        &self,
        available: &[ProviderType],
        _context: &SelectionContext,
    ) -> Option<ProviderType> {
        let mut half_open = None;
        let mut open = None;
        for &provider in available {
            match self.breakers.state(&breaker_key(provider)) {
                CircuitState::Closed => {
                    debug!(provider = %provider, "selected healthy provider");
                    return Some(provider);
                }
                CircuitState::HalfOpen => half_open.get_or_insert(provider),
                CircuitState::Open => open.get_or_insert(provider),
            };
        }
        if let Some(provider) = half_open {
            debug!(provider = %provider, "no healthy provider, using half-open circuit");
            return Some(provider);
        }
        if let Some(provider) = open {
            warn!(provider = %provider, "all circuits open, using open circuit as last resort");
            return Some(provider);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreakerConfig;
    use crate::catalog::{builtin_catalog, Capability};
    use crate::config::SwitchboardConfig;
    use crate::provider::test_support::PricedProvider;

    fn factory_with(providers: &[(ProviderType, f64, f64)]) -> Arc<ProviderFactory> {
        let factory = Arc::new(ProviderFactory::new(SwitchboardConfig::default()));
        for &(provider, input, output) in providers {
            factory.register_instance(Arc::new(PricedProvider::new(provider, input, output)));
        }
        factory
    }

    // ==================== ByName ====================

    #[test]
    fn test_by_name_resolves_model_owner() {
        let registry = Arc::new(ModelRegistry::from_catalog(&builtin_catalog()));
        let strategy = ByNameStrategy::new(registry);
        let available = vec![ProviderType::OpenAi, ProviderType::Anthropic];

        let context = SelectionContext::new().with_model("claude-3-5-sonnet-20241022");
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::Anthropic)
        );

        // pattern resolution covers unregistered model ids too
        let context = SelectionContext::new().with_model("claude-experimental");
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::Anthropic)
        );
    }

    #[test]
    fn test_by_name_falls_back_to_preferred_provider() {
        let registry = Arc::new(ModelRegistry::new());
        let strategy = ByNameStrategy::new(registry);
        let available = vec![ProviderType::OpenAi];

        let context = SelectionContext::new().with_preferred_provider(ProviderType::OpenAi);
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::OpenAi)
        );

        // preferred but unavailable declines rather than failing
        let context = SelectionContext::new().with_preferred_provider(ProviderType::Google);
        assert_eq!(strategy.select(&available, &context), None);
        assert!(!strategy.can_handle(&SelectionContext::new()));
    }

    // ==================== ByCapability ====================

    #[test]
    fn test_by_capability_filters_and_keeps_registration_order() {
        let factory = factory_with(&[
            (ProviderType::Google, 1.0, 5.0),
            (ProviderType::Anthropic, 3.0, 15.0),
        ]);
        let strategy = ByCapabilityStrategy::new(factory);
        let available = vec![ProviderType::Google, ProviderType::Anthropic];

        // both support streaming; first registered wins
        let context = SelectionContext::new().with_capability(Capability::Streaming);
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::Google)
        );

        // PricedProvider models never support vision
        let context = SelectionContext::new().with_capability(Capability::Vision);
        assert_eq!(strategy.select(&available, &context), None);
    }

    // ==================== ByCost ====================

    #[test]
    fn test_by_cost_picks_cheapest_provider() {
        let factory = factory_with(&[
            (ProviderType::Anthropic, 3.0, 15.0),
            (ProviderType::Google, 1.0, 5.0),
        ]);
        let strategy = ByCostStrategy::new(factory);
        let available = vec![ProviderType::Anthropic, ProviderType::Google];

        let context = SelectionContext::new().with_estimated_tokens(500, 500);
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::Google)
        );
    }

    #[test]
    fn test_by_cost_honors_per_token_ceiling() {
        let factory = factory_with(&[(ProviderType::Anthropic, 3.0, 15.0)]);
        let strategy = ByCostStrategy::new(factory);
        let available = vec![ProviderType::Anthropic];

        // $3/$15 per M at 500/500 tokens is $0.009, i.e. 9e-6 per token
        let mut context = SelectionContext::new().with_estimated_tokens(500, 500);
        context.max_cost_per_token = Some(1e-6);
        assert_eq!(strategy.select(&available, &context), None);

        context.max_cost_per_token = Some(1e-5);
        assert_eq!(
            strategy.select(&available, &context),
            Some(ProviderType::Anthropic)
        );
    }

    // ==================== ByAvailability ====================

    #[test]
    fn test_by_availability_prefers_closed_circuits() {
        let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        }));
        let strategy = ByAvailabilityStrategy::new(breakers.clone());
        let available = vec![ProviderType::OpenAi, ProviderType::Anthropic];

        // trip the first provider's breaker
        breakers
            .breaker(&breaker_key(ProviderType::OpenAi))
            .record_failure();
        assert_eq!(
            strategy.select(&available, &SelectionContext::new()),
            Some(ProviderType::Anthropic)
        );

        // with every circuit open, still returns something
        breakers
            .breaker(&breaker_key(ProviderType::Anthropic))
            .record_failure();
        assert_eq!(
            strategy.select(&available, &SelectionContext::new()),
            Some(ProviderType::OpenAi)
        );
    }
}
