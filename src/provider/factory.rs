//! Provider construction and caching

use super::traits::LlmProvider;
use super::types::ProviderType;
use crate::config::{ProviderSettings, SwitchboardConfig};
use crate::error::{ErrorKind, ProviderError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Constructor for one provider family
pub type ProviderBuilder =
    Box<dyn Fn(&ProviderSettings) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Builds and caches provider adapter instances from configuration
///
/// Builders are registered per provider family; instances are constructed
/// lazily on first use and cached for the process lifetime. Pre-built
/// adapters (including test doubles) can be registered directly.
pub struct ProviderFactory {
    config: SwitchboardConfig,
    builders: DashMap<ProviderType, ProviderBuilder>,
    instances: DashMap<ProviderType, Arc<dyn LlmProvider>>,
    // registration order, for deterministic selection tie-breaking
    order: Mutex<Vec<ProviderType>>,
}

impl ProviderFactory {
    /// Create a factory from configuration
    pub fn new(config: SwitchboardConfig) -> Self {
        Self {
            config,
            builders: DashMap::new(),
            instances: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Register a builder for a provider family
    pub fn register_builder(&self, provider: ProviderType, builder: ProviderBuilder) {
        self.builders.insert(provider, builder);
        self.remember_order(provider);
    }

    /// Register a ready-made adapter instance
    pub fn register_instance(&self, instance: Arc<dyn LlmProvider>) {
        let provider = instance.provider_type();
        self.instances.insert(provider, instance);
        self.remember_order(provider);
        debug!(%provider, "provider instance registered");
    }

    fn remember_order(&self, provider: ProviderType) {
        let mut order = self.order.lock();
        if !order.contains(&provider) {
            order.push(provider);
        }
    }

    /// Get the cached adapter for a provider, constructing it if needed
    pub fn get_or_create(&self, provider: ProviderType) -> Result<Arc<dyn LlmProvider>> {
        if let Some(instance) = self.instances.get(&provider) {
            return Ok(instance.clone());
        }

        let builder = self.builders.get(&provider).ok_or_else(|| {
            ProviderError::new(
                ErrorKind::Validation,
                format!("no adapter registered for provider {provider}"),
            )
        })?;
        let settings = self.config.provider(provider).ok_or_else(|| {
            ProviderError::new(
                ErrorKind::Validation,
                format!("provider {provider} is not configured"),
            )
        })?;

        let instance = builder(settings)?;
        info!(%provider, "provider adapter constructed");
        self.instances.insert(provider, instance.clone());
        Ok(instance)
    }

    /// Providers that can currently serve requests, in registration order
    pub fn available(&self) -> Vec<ProviderType> {
        let order = self.order.lock();
        order
            .iter()
            .copied()
            .filter(|p| {
                self.instances.contains_key(p)
                    || (self.builders.contains_key(p) && self.config.provider(*p).is_some())
            })
            .collect()
    }

    /// Whether the provider can currently serve requests
    pub fn is_available(&self, provider: ProviderType) -> bool {
        self.available().contains(&provider)
    }

    /// Destroy all cached adapters and forget them
    pub async fn destroy_all(&self) {
        let instances: Vec<Arc<dyn LlmProvider>> = self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.instances.clear();
        futures::future::join_all(instances.iter().map(|instance| instance.destroy())).await;
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("available", &self.available())
            .field("cached", &self.instances.len())
            .finish()
    }
}
