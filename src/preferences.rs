//! Per-user and per-conversation provider preferences
//!
//! Resolution order: conversation-level preference, then user-level, then
//! nothing (callers fall back to the system default). Preferences change only
//! through explicit set/delete calls; there is no expiry.

use crate::provider::ProviderType;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A stored provider/model preference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPreference {
    /// Owning user
    pub user_id: String,
    /// Conversation scope; `None` for user-level preferences
    pub conversation_id: Option<String>,
    /// Provider to prefer
    pub preferred_provider: ProviderType,
    /// Model to prefer, if pinned
    pub preferred_model: Option<String>,
    /// Per-message spend ceiling in USD
    pub max_cost_per_message: Option<f64>,
    /// When the preference was first stored
    pub created_at: DateTime<Utc>,
    /// When the preference last changed
    pub updated_at: DateTime<Utc>,
}

/// In-memory preference store
#[derive(Debug, Default)]
pub struct ProviderPreferenceStore {
    by_user: DashMap<String, ProviderPreference>,
    by_conversation: DashMap<(String, String), ProviderPreference>,
    system_default: RwLock<Option<ProviderType>>,
}

impl ProviderPreferenceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user-level preference
    pub fn set_user_preference(
        &self,
        user_id: impl Into<String>,
        provider: ProviderType,
        model: Option<String>,
    ) {
        let user_id = user_id.into();
        let now = Utc::now();
        let created_at = self
            .by_user
            .get(&user_id)
            .map(|p| p.created_at)
            .unwrap_or(now);
        self.by_user.insert(
            user_id.clone(),
            ProviderPreference {
                user_id,
                conversation_id: None,
                preferred_provider: provider,
                preferred_model: model,
                max_cost_per_message: None,
                created_at,
                updated_at: now,
            },
        );
    }

    /// Store a conversation-level preference, overriding the user level
    pub fn set_conversation_preference(
        &self,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        provider: ProviderType,
        model: Option<String>,
    ) {
        let user_id = user_id.into();
        let conversation_id = conversation_id.into();
        let key = (user_id.clone(), conversation_id.clone());
        let now = Utc::now();
        let created_at = self
            .by_conversation
            .get(&key)
            .map(|p| p.created_at)
            .unwrap_or(now);
        self.by_conversation.insert(
            key,
            ProviderPreference {
                user_id,
                conversation_id: Some(conversation_id),
                preferred_provider: provider,
                preferred_model: model,
                max_cost_per_message: None,
                created_at,
                updated_at: now,
            },
        );
    }

    /// Resolve the effective preference: conversation first, then user
    pub fn resolve(&self, user_id: &str, conversation_id: Option<&str>) -> Option<ProviderPreference> {
        if let Some(conversation_id) = conversation_id {
            let key = (user_id.to_string(), conversation_id.to_string());
            if let Some(preference) = self.by_conversation.get(&key) {
                return Some(preference.clone());
            }
        }
        self.by_user.get(user_id).map(|p| p.clone())
    }

    /// Delete a user-level preference
    pub fn delete_user_preference(&self, user_id: &str) -> bool {
        self.by_user.remove(user_id).is_some()
    }

    /// Delete a conversation-level preference
    pub fn delete_conversation_preference(&self, user_id: &str, conversation_id: &str) -> bool {
        self.by_conversation
            .remove(&(user_id.to_string(), conversation_id.to_string()))
            .is_some()
    }

    /// Set the final fallback used when no preference exists anywhere
    pub fn set_system_default(&self, provider: ProviderType) {
        *self.system_default.write() = Some(provider);
    }

    /// The system default provider, if one was set
    pub fn system_default(&self) -> Option<ProviderType> {
        *self.system_default.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_overrides_user() {
        let store = ProviderPreferenceStore::new();
        store.set_user_preference("alice", ProviderType::OpenAi, None);
        store.set_conversation_preference(
            "alice",
            "conv-1",
            ProviderType::Anthropic,
            Some("claude-3-5-sonnet-20241022".to_string()),
        );

        let pref = store.resolve("alice", Some("conv-1")).unwrap();
        assert_eq!(pref.preferred_provider, ProviderType::Anthropic);

        // other conversations still see the user-level preference
        let pref = store.resolve("alice", Some("conv-2")).unwrap();
        assert_eq!(pref.preferred_provider, ProviderType::OpenAi);

        let pref = store.resolve("alice", None).unwrap();
        assert_eq!(pref.preferred_provider, ProviderType::OpenAi);
    }

    #[test]
    fn test_resolve_unknown_user_is_none() {
        let store = ProviderPreferenceStore::new();
        assert!(store.resolve("nobody", None).is_none());
    }

    #[test]
    fn test_delete() {
        let store = ProviderPreferenceStore::new();
        store.set_user_preference("bob", ProviderType::Google, None);
        store.set_conversation_preference("bob", "c1", ProviderType::OpenAi, None);

        assert!(store.delete_conversation_preference("bob", "c1"));
        assert!(!store.delete_conversation_preference("bob", "c1"));
        let pref = store.resolve("bob", Some("c1")).unwrap();
        assert_eq!(pref.preferred_provider, ProviderType::Google);

        assert!(store.delete_user_preference("bob"));
        assert!(store.resolve("bob", Some("c1")).is_none());
    }

    #[test]
    fn test_update_keeps_created_at() {
        let store = ProviderPreferenceStore::new();
        store.set_user_preference("carol", ProviderType::OpenAi, None);
        let created = store.resolve("carol", None).unwrap().created_at;
        store.set_user_preference("carol", ProviderType::Anthropic, None);
        let updated = store.resolve("carol", None).unwrap();
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.preferred_provider, ProviderType::Anthropic);
    }

    #[test]
    fn test_system_default() {
        let store = ProviderPreferenceStore::new();
        assert!(store.system_default().is_none());
        store.set_system_default(ProviderType::Anthropic);
        assert_eq!(store.system_default(), Some(ProviderType::Anthropic));
    }
}
