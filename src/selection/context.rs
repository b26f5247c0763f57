//! Per-request selection context

use crate::catalog::Capability;
use crate::provider::ProviderType;

/// Named selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Pick by explicit model or provider name
    ByName,
    /// Pick by required capabilities
    ByCapability,
    /// Pick the cheapest qualifying provider
    ByCost,
    /// Pick by circuit breaker health
    ByAvailability,
}

/// Everything a strategy may consult when picking a provider
///
/// Built fresh for each request and enriched from the preference store before
/// strategies run; values set here always win over stored preferences.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    /// Requesting user, if known
    pub user_id: Option<String>,
    /// Conversation the request belongs to, if any
    pub conversation_id: Option<String>,
    /// Explicitly requested model id
    pub model_id: Option<String>,
    /// Force a single strategy instead of the priority cascade
    pub strategy: Option<StrategyKind>,
    /// Capabilities the chosen provider's models must offer
    pub required_capabilities: Vec<Capability>,
    /// Expected input token count for cost estimation
    pub estimated_input_tokens: Option<u64>,
    /// Expected output token count for cost estimation
    pub estimated_output_tokens: Option<u64>,
    /// Reject providers whose cheapest model costs more than this per token
    pub max_cost_per_token: Option<f64>,
    /// Providers that must not be chosen (e.g. already failed this request)
    pub excluded_providers: Vec<ProviderType>,
    /// Provider the caller or a stored preference asks for
    pub preferred_provider: Option<ProviderType>,
}

impl SelectionContext {
    /// Empty context; the cascade will fall through to defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a specific user/conversation pair
    pub fn for_request(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            conversation_id: Some(conversation_id.into()),
            ..Self::default()
        }
    }

    /// Request a specific model
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Force one strategy
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Require a capability
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.required_capabilities.push(capability);
        self
    }

    /// Set the token estimate used for cost comparison
    pub fn with_estimated_tokens(mut self, input: u64, output: u64) -> Self {
        self.estimated_input_tokens = Some(input);
        self.estimated_output_tokens = Some(output);
        self
    }

    /// Exclude a provider from consideration
    pub fn without_provider(mut self, provider: ProviderType) -> Self {
        self.excluded_providers.push(provider);
        self
    }

    /// Ask for a provider by name
    pub fn with_preferred_provider(mut self, provider: ProviderType) -> Self {
        self.preferred_provider = Some(provider);
        self
    }
}
