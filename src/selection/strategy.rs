//! The pluggable strategy contract

use super::context::{SelectionContext, StrategyKind};
use crate::provider::ProviderType;

/// A policy that picks one provider out of the currently available set
///
/// Strategies are consulted in descending [`priority`](Self::priority) order;
/// the first one that both [`can_handle`](Self::can_handle)s the context and
/// returns `Some` wins. Returning `None` means "no opinion", not an error.
pub trait SelectionStrategy: Send + Sync {
    /// Which named strategy this implements
    fn kind(&self) -> StrategyKind;

    /// Whether the context carries the inputs this strategy needs
    fn can_handle(&self, context: &SelectionContext) -> bool;

    /// Cascade ordering; higher runs first
    fn priority(&self) -> u8;

    /// Pick a provider from `available`, or decline with `None`
    ///
    /// `available` is already filtered for exclusions and ordered by
    /// registration; strategies must only return members of it.
    fn select(&self, available: &[ProviderType], context: &SelectionContext)
        -> Option<ProviderType>;
}
