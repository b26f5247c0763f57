//! Provider plugin interface, shared request/response types, and the factory

mod factory;
#[cfg(test)]
pub(crate) mod test_support;
mod traits;
mod types;

pub use factory::{ProviderBuilder, ProviderFactory};
pub use traits::{ChunkSender, LlmProvider};
pub use types::{
    AiResponse, Cost, Message, MessageRole, ProviderType, SendMessageParams, SendRequest,
    StopReason, TokenUsage,
};
