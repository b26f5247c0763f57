//! The provider plugin interface
//!
//! Any vendor adapter implementing [`LlmProvider`] can be registered with the
//! factory without touching the rest of the crate. The adapter owns its own
//! transport; this crate only sees normalized requests, text chunks, and the
//! final structured response.

use super::types::{AiResponse, Cost, ProviderType, SendMessageParams};
use crate::catalog::ModelConfig;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Channel through which an adapter pushes raw streamed text chunks
///
/// The switchboard drains the receiving side into a
/// [`crate::streaming::StreamController`], which applies buffering, pause, and
/// cancellation semantics. Adapters just send text and stop when the send
/// fails (the receiver is dropped on cancellation).
pub type ChunkSender = mpsc::UnboundedSender<String>;

/// Unified interface every provider adapter implements
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which provider family this adapter serves
    fn provider_type(&self) -> ProviderType;

    /// Cheap connectivity/credential probe
    async fn test_connection(&self) -> Result<()>;

    /// One-shot completion without streaming
    async fn send_message(&self, params: &SendMessageParams) -> Result<AiResponse>;

    /// Streaming completion
    ///
    /// Pushes text chunks through `chunks` as they arrive and resolves with
    /// the final response once the provider reports completion. The returned
    /// `content` must equal the concatenation of all pushed chunks.
    async fn stream_message(
        &self,
        params: &SendMessageParams,
        chunks: ChunkSender,
    ) -> Result<AiResponse>;

    /// Models this adapter can serve
    fn available_models(&self) -> Vec<ModelConfig>;

    /// Estimated dollar cost for a hypothetical call, if the model is known
    fn estimate_cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> Option<Cost>;

    /// Release any held resources; the adapter is not used afterwards
    async fn destroy(&self);
}
