//! Configuration surface
//!
//! Per-provider settings are loaded once when the [`crate::provider::ProviderFactory`]
//! is built; the core never re-reads them. Hot reload belongs to the caller.

use crate::error::{ErrorKind, ProviderError, Result};
use crate::provider::ProviderType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Settings for one provider adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key; may be left empty and filled from the environment
    #[serde(default)]
    pub api_key: String,
    /// Override for the provider's API endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model used when neither request nor preference names one
    pub default_model: String,
    /// Default output token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Local retry budget for this provider
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Organization id, for providers that scope keys to one
    #[serde(default)]
    pub organization_id: Option<String>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    3
}

/// Full configuration: one settings block per provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    /// Configured providers, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<ProviderType, ProviderSettings>,
}

impl SwitchboardConfig {
    /// Load configuration from a YAML file
    ///
    /// After parsing, empty API keys are filled from `<PROVIDER>_API_KEY`
    /// environment variables (e.g. `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`).
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProviderError::new(
                ErrorKind::Validation,
                format!("cannot read config {}: {e}", path.as_ref().display()),
            )
        })?;
        let mut config: Self = serde_yaml::from_str(&raw).map_err(|e| {
            ProviderError::new(ErrorKind::Validation, format!("invalid config: {e}"))
        })?;
        config.fill_keys_from_env();
        Ok(config)
    }

    /// Fill empty API keys from the environment
    pub fn fill_keys_from_env(&mut self) {
        for (provider, settings) in self.providers.iter_mut() {
            if settings.api_key.is_empty() {
                let var = format!("{}_API_KEY", provider.as_str().to_uppercase());
                if let Ok(key) = std::env::var(&var) {
                    settings.api_key = key;
                }
            }
        }
    }

    /// Settings for one provider, if configured
    pub fn provider(&self, provider: ProviderType) -> Option<&ProviderSettings> {
        self.providers.get(&provider)
    }

    /// Reject configurations that cannot work at all
    pub fn validate(&self) -> Result<()> {
        for (provider, settings) in &self.providers {
            if settings.default_model.is_empty() {
                return Err(ProviderError::new(
                    ErrorKind::Validation,
                    format!("provider {provider} has no default_model"),
                ));
            }
            if settings.timeout_ms == 0 {
                return Err(ProviderError::new(
                    ErrorKind::Validation,
                    format!("provider {provider} has timeout_ms = 0"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
providers:
  openai:
    api_key: sk-test
    default_model: gpt-4o-mini
    max_tokens: 2048
  anthropic:
    default_model: claude-3-5-haiku-20241022
    timeout_ms: 30000
"#;

    #[test]
    fn test_yaml_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = SwitchboardConfig::from_yaml_file(file.path()).unwrap();
        let openai = config.provider(ProviderType::OpenAi).unwrap();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.max_tokens, 2048);
        assert_eq!(openai.timeout_ms, 60_000);

        let anthropic = config.provider(ProviderType::Anthropic).unwrap();
        assert_eq!(anthropic.timeout_ms, 30_000);
        assert_eq!(anthropic.max_retries, 3);
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut config = SwitchboardConfig::default();
        config.providers.insert(
            ProviderType::OpenAi,
            ProviderSettings {
                api_key: "k".to_string(),
                base_url: None,
                default_model: String::new(),
                max_tokens: 1024,
                timeout_ms: 1000,
                max_retries: 1,
                organization_id: None,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_validation_error() {
        let err = SwitchboardConfig::from_yaml_file("/does/not/exist.yaml").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
