//! Static model catalog: capabilities, pricing, and the model registry
//!
//! Catalog data is loaded once at registry construction and immutable
//! thereafter. Pricing is expressed in USD per million tokens.

mod registry;

pub use registry::ModelRegistry;

use crate::provider::ProviderType;
use serde::{Deserialize, Serialize};

/// Rough price/quality band of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheapest, fastest models
    Economy,
    /// Everyday workhorse models
    Standard,
    /// Frontier models
    Premium,
}

/// A single requestable model capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Token-by-token streaming
    Streaming,
    /// Image input
    Vision,
    /// Tool/function calling
    FunctionCalling,
    /// Prompt caching
    PromptCaching,
    /// Constrained JSON output
    JsonMode,
}

/// What a model can do, as a closed schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Supports token-by-token streaming
    pub streaming: bool,
    /// Accepts image input
    pub vision: bool,
    /// Supports tool/function calling
    pub function_calling: bool,
    /// Supports prompt caching
    pub prompt_caching: bool,
    /// Supports constrained JSON output
    pub json_mode: bool,
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl ModelCapabilities {
    /// Whether the model has the given capability
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Streaming => self.streaming,
            Capability::Vision => self.vision,
            Capability::FunctionCalling => self.function_calling,
            Capability::PromptCaching => self.prompt_caching,
            Capability::JsonMode => self.json_mode,
        }
    }
}

/// USD cost per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Input token price
    pub input: f64,
    /// Output token price
    pub output: f64,
    /// Cached input token price, where supported
    pub cached_input: Option<f64>,
}

impl ModelPricing {
    /// Estimated USD cost for the given token counts
    pub fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input + output_tokens as f64 * self.output) / 1_000_000.0
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Canonical model id used in API calls
    pub id: String,
    /// Display name
    pub name: String,
    /// Owning provider
    pub provider: ProviderType,
    /// Price/quality band
    pub tier: ModelTier,
    /// Capability flags and limits
    pub capabilities: ModelCapabilities,
    /// USD per-million-token pricing
    pub pricing: ModelPricing,
    /// Scheduled for removal; avoid for new conversations
    pub deprecated: bool,
    /// Preferred default within its tier
    pub recommended: bool,
}

fn chat_capabilities(context_window: u32, max_output_tokens: u32, vision: bool) -> ModelCapabilities {
    ModelCapabilities {
        streaming: true,
        vision,
        function_calling: true,
        prompt_caching: false,
        json_mode: true,
        context_window,
        max_output_tokens,
    }
}

/// The built-in model catalog
///
/// A pragmatic snapshot of the models the bundled adapters serve; callers with
/// their own catalogs can register models directly on the [`ModelRegistry`].
pub fn builtin_catalog() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: "gpt-4o".to_string(),
            name: "GPT-4o".to_string(),
            provider: ProviderType::OpenAi,
            tier: ModelTier::Standard,
            capabilities: chat_capabilities(128_000, 16_384, true),
            pricing: ModelPricing {
                input: 2.50,
                output: 10.00,
                cached_input: Some(1.25),
            },
            deprecated: false,
            recommended: true,
        },
        ModelConfig {
            id: "gpt-4o-mini".to_string(),
            name: "GPT-4o mini".to_string(),
            provider: ProviderType::OpenAi,
            tier: ModelTier::Economy,
            capabilities: chat_capabilities(128_000, 16_384, true),
            pricing: ModelPricing {
                input: 0.15,
                output: 0.60,
                cached_input: Some(0.075),
            },
            deprecated: false,
            recommended: true,
        },
        ModelConfig {
            id: "o1".to_string(),
            name: "o1".to_string(),
            provider: ProviderType::OpenAi,
            tier: ModelTier::Premium,
            capabilities: chat_capabilities(200_000, 100_000, true),
            pricing: ModelPricing {
                input: 15.00,
                output: 60.00,
                cached_input: Some(7.50),
            },
            deprecated: false,
            recommended: false,
        },
        ModelConfig {
            id: "claude-3-5-sonnet-20241022".to_string(),
            name: "Claude 3.5 Sonnet".to_string(),
            provider: ProviderType::Anthropic,
            tier: ModelTier::Standard,
            capabilities: ModelCapabilities {
                prompt_caching: true,
                ..chat_capabilities(200_000, 8_192, true)
            },
            pricing: ModelPricing {
                input: 3.00,
                output: 15.00,
                cached_input: Some(0.30),
            },
            deprecated: false,
            recommended: true,
        },
        ModelConfig {
            id: "claude-3-5-haiku-20241022".to_string(),
            name: "Claude 3.5 Haiku".to_string(),
            provider: ProviderType::Anthropic,
            tier: ModelTier::Economy,
            capabilities: ModelCapabilities {
                prompt_caching: true,
                ..chat_capabilities(200_000, 8_192, false)
            },
            pricing: ModelPricing {
                input: 0.80,
                output: 4.00,
                cached_input: Some(0.08),
            },
            deprecated: false,
            recommended: true,
        },
        ModelConfig {
            id: "claude-3-opus-20240229".to_string(),
            name: "Claude 3 Opus".to_string(),
            provider: ProviderType::Anthropic,
            tier: ModelTier::Premium,
            capabilities: ModelCapabilities {
                prompt_caching: true,
                ..chat_capabilities(200_000, 4_096, true)
            },
            pricing: ModelPricing {
                input: 15.00,
                output: 75.00,
                cached_input: Some(1.50),
            },
            deprecated: true,
            recommended: false,
        },
        ModelConfig {
            id: "gemini-1.5-pro".to_string(),
            name: "Gemini 1.5 Pro".to_string(),
            provider: ProviderType::Google,
            tier: ModelTier::Standard,
            capabilities: chat_capabilities(2_000_000, 8_192, true),
            pricing: ModelPricing {
                input: 1.25,
                output: 5.00,
                cached_input: None,
            },
            deprecated: false,
            recommended: true,
        },
        ModelConfig {
            id: "gemini-1.5-flash".to_string(),
            name: "Gemini 1.5 Flash".to_string(),
            provider: ProviderType::Google,
            tier: ModelTier::Economy,
            capabilities: chat_capabilities(1_000_000, 8_192, true),
            pricing: ModelPricing {
                input: 0.075,
                output: 0.30,
                cached_input: None,
            },
            deprecated: false,
            recommended: true,
        },
    ]
}
