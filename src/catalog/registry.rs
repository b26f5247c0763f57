//! Model-to-provider resolution

use super::ModelConfig;
use crate::provider::ProviderType;
use dashmap::DashMap;
use tracing::debug;

/// Maps model identifiers to their owning provider
///
/// Exact registrations win; on a miss, provider-family naming conventions are
/// applied in order. A `None` result means "unknown model", which callers must
/// not treat as an error by itself.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    exact: DashMap<String, ProviderType>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded from a catalog
    pub fn from_catalog(models: &[ModelConfig]) -> Self {
        let registry = Self::new();
        registry.register_from_catalog(models);
        registry
    }

    /// Register one model id
    pub fn register_model(&self, id: impl Into<String>, provider: ProviderType) {
        self.exact.insert(id.into(), provider);
    }

    /// Bulk-register every model of a catalog
    pub fn register_from_catalog(&self, models: &[ModelConfig]) {
        for model in models {
            self.exact.insert(model.id.clone(), model.provider);
        }
    }

    /// Resolve a model id to its owning provider
    pub fn resolve(&self, model_id: &str) -> Option<ProviderType> {
        if let Some(provider) = self.exact.get(model_id) {
            return Some(*provider);
        }
        let resolved = Self::resolve_by_pattern(model_id);
        if let Some(provider) = resolved {
            debug!(model = model_id, %provider, "model resolved by naming pattern");
        }
        resolved
    }

    /// Number of exact registrations
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// Whether no models are registered
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Provider-family naming conventions, checked in order
    fn resolve_by_pattern(model_id: &str) -> Option<ProviderType> {
        let lower = model_id.to_lowercase();
        if lower.starts_with("claude") || lower.contains("anthropic") {
            Some(ProviderType::Anthropic)
        } else if lower.starts_with("gpt-")
            || lower.starts_with("o1")
            || lower.starts_with("o3")
            || lower.starts_with("text-")
            || lower.contains("openai")
        {
            Some(ProviderType::OpenAi)
        } else if lower.starts_with("gemini") || lower.contains("google") {
            Some(ProviderType::Google)
        } else if lower.contains('/') {
            // vendor/model ids are the OpenRouter convention
            Some(ProviderType::OpenRouter)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;

    #[test]
    fn test_exact_match_wins_over_pattern() {
        let registry = ModelRegistry::new();
        // deliberately contradicts the naming convention
        registry.register_model("claude-compatible-proxy", ProviderType::OpenRouter);
        assert_eq!(
            registry.resolve("claude-compatible-proxy"),
            Some(ProviderType::OpenRouter)
        );
    }

    #[test]
    fn test_pattern_fallback() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.resolve("claude-x"), Some(ProviderType::Anthropic));
        assert_eq!(registry.resolve("gpt-5-preview"), Some(ProviderType::OpenAi));
        assert_eq!(registry.resolve("o1-pro"), Some(ProviderType::OpenAi));
        assert_eq!(registry.resolve("text-davinci-003"), Some(ProviderType::OpenAi));
        assert_eq!(registry.resolve("gemini-2.0-flash"), Some(ProviderType::Google));
        assert_eq!(
            registry.resolve("mistralai/mixtral-8x7b"),
            Some(ProviderType::OpenRouter)
        );
    }

    #[test]
    fn test_unknown_model_is_none() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.resolve("totally-novel-model"), None);
    }

    #[test]
    fn test_from_catalog() {
        let registry = ModelRegistry::from_catalog(&builtin_catalog());
        assert!(!registry.is_empty());
        assert_eq!(registry.resolve("gpt-4o"), Some(ProviderType::OpenAi));
        assert_eq!(
            registry.resolve("claude-3-5-sonnet-20241022"),
            Some(ProviderType::Anthropic)
        );
        assert_eq!(registry.resolve("gemini-1.5-flash"), Some(ProviderType::Google));
    }
}
