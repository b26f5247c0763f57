//! Provider selection: context, pluggable strategies, and the cascade
//!
//! Four built-in strategies cover the common policies (explicit name,
//! capability, cost, breaker health); anything else plugs in through
//! [`SelectionStrategy`].

mod context;
mod selector;
mod strategies;
mod strategy;

pub use context::{SelectionContext, StrategyKind};
pub use selector::ProviderSelector;
pub use strategies::{
    ByAvailabilityStrategy, ByCapabilityStrategy, ByCostStrategy, ByNameStrategy,
};
pub use strategy::SelectionStrategy;

pub(crate) use strategies::breaker_key;
