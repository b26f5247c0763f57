//! # llm-switchboard
//!
//! Resilience and selection core for applications talking to multiple
//! heterogeneous LLM providers. The switchboard turns unreliable, rate-limited
//! streaming vendor APIs into one dependable interface:
//!
//! - **Error taxonomy**: every vendor failure is classified into a canonical
//!   [`ErrorKind`](error::ErrorKind) with retryability and severity attached
//! - **Retry**: transient failures are retried with jittered exponential
//!   backoff, honoring provider `retry-after` hints
//! - **Circuit breaking**: repeatedly failing providers are isolated and
//!   probed before traffic returns
//! - **Selection**: pluggable strategies pick a provider by name, capability,
//!   cost, or breaker health, layered over per-user preferences
//! - **Fallback**: configured provider chains absorb outages; failures are
//!   aggregated, never swallowed
//! - **Streaming**: one normalized event stream per message with pause/resume
//!   buffering, backpressure, inactivity timeout, and cooperative cancellation
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use llm_switchboard::provider::{Message, ProviderType, SendRequest};
//! use llm_switchboard::{Switchboard, SwitchboardConfig};
//! use std::sync::Arc;
//!
//! # async fn example(adapter: Arc<dyn llm_switchboard::provider::LlmProvider>) -> llm_switchboard::Result<()> {
//! let switchboard = Switchboard::new(SwitchboardConfig::default());
//! switchboard.register_provider(adapter);
//! switchboard.set_fallback_chain(ProviderType::OpenAi, vec![ProviderType::Anthropic]);
//!
//! let mut reply = switchboard.stream_message(SendRequest {
//!     conversation_id: "conv-1".into(),
//!     user_id: "alice".into(),
//!     message_id: "msg-1".into(),
//!     history: vec![Message::user("Hello!")],
//!     model_override: None,
//!     system_prompt: None,
//!     max_tokens: None,
//!     temperature: None,
//! })?;
//!
//! while let Some(event) = reply.events.recv().await {
//!     println!("{event:?}");
//! }
//! let response = reply.into_response().await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```
//!
//! The crate is transport-free: vendor adapters implement
//! [`LlmProvider`](provider::LlmProvider) and own their own HTTP/SSE stack.

#![warn(clippy::all)]

pub mod breaker;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod preferences;
pub mod provider;
pub mod retry;
pub mod selection;
pub mod streaming;
pub mod switchboard;

pub use breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use cancel::CancelHandle;
pub use config::{ProviderSettings, SwitchboardConfig};
pub use error::{ErrorKind, ProviderError, Result, Severity};
pub use fallback::{FallbackChainExecutor, FallbackOptions};
pub use preferences::ProviderPreferenceStore;
pub use provider::{AiResponse, LlmProvider, ProviderFactory, ProviderType, SendRequest};
pub use retry::{RateLimitRetrier, RetryConfig};
pub use selection::{ProviderSelector, SelectionContext, SelectionStrategy, StrategyKind};
pub use streaming::{StreamConfig, StreamController, StreamEvent, StreamState};
pub use switchboard::{StreamingReply, Switchboard, SwitchboardOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
