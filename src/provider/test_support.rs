//! Shared provider doubles for unit tests

use super::traits::{ChunkSender, LlmProvider};
use super::types::{AiResponse, Cost, ProviderType, SendMessageParams, StopReason, TokenUsage};
use crate::catalog::{ModelCapabilities, ModelConfig, ModelPricing, ModelTier};
use crate::error::Result;
use async_trait::async_trait;

/// A provider exposing one model with fixed per-million-token pricing
pub struct PricedProvider {
    provider: ProviderType,
    pricing: ModelPricing,
}

impl PricedProvider {
    pub fn new(provider: ProviderType, input: f64, output: f64) -> Self {
        Self {
            provider,
            pricing: ModelPricing {
                input,
                output,
                cached_input: None,
            },
        }
    }

    fn model_id(&self) -> String {
        format!("{}-test-model", self.provider.as_str())
    }
}

#[async_trait]
impl LlmProvider for PricedProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, params: &SendMessageParams) -> Result<AiResponse> {
        let usage = TokenUsage::new(10, 5);
        Ok(AiResponse {
            content: "ok".to_string(),
            token_usage: usage,
            cost: Cost::usd(
                usage.input as f64 * self.pricing.input / 1_000_000.0,
                usage.output as f64 * self.pricing.output / 1_000_000.0,
            ),
            model: params.model.clone(),
            stop_reason: StopReason::EndTurn,
            provider: self.provider,
        })
    }

    async fn stream_message(
        &self,
        params: &SendMessageParams,
        chunks: ChunkSender,
    ) -> Result<AiResponse> {
        let _ = chunks.send("ok".to_string());
        self.send_message(params).await
    }

    fn available_models(&self) -> Vec<ModelConfig> {
        vec![ModelConfig {
            id: self.model_id(),
            name: format!("{} test model", self.provider.as_str()),
            provider: self.provider,
            tier: ModelTier::Standard,
            capabilities: ModelCapabilities {
                streaming: true,
                vision: false,
                function_calling: true,
                prompt_caching: false,
                json_mode: true,
                context_window: 128_000,
                max_output_tokens: 8_192,
            },
            pricing: self.pricing,
            deprecated: false,
            recommended: true,
        }]
    }

    fn estimate_cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> Option<Cost> {
        if model_id != self.model_id() {
            return None;
        }
        Some(Cost::usd(
            input_tokens as f64 * self.pricing.input / 1_000_000.0,
            output_tokens as f64 * self.pricing.output / 1_000_000.0,
        ))
    }

    async fn destroy(&self) {}
}
