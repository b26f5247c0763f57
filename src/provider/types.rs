//! Request and response types shared by all provider adapters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI (gpt-*, o1-*, legacy text-* models)
    OpenAi,
    /// Anthropic (claude-* models)
    Anthropic,
    /// Google (gemini-* models)
    Google,
    /// OpenRouter aggregation gateway
    OpenRouter,
}

impl ProviderType {
    /// All known provider types, in declaration order
    pub const ALL: [ProviderType; 4] = [
        ProviderType::OpenAi,
        ProviderType::Anthropic,
        ProviderType::Google,
        ProviderType::OpenRouter,
    ];

    /// Stable lowercase name used in config files, breaker keys, and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Google => "google",
            ProviderType::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAi),
            "anthropic" => Ok(ProviderType::Anthropic),
            "google" | "gemini" => Ok(ProviderType::Google),
            "openrouter" => Ok(ProviderType::OpenRouter),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt
    System,
    /// End-user turn
    User,
    /// Model turn
    Assistant,
}

/// One turn of conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the turn
    pub role: MessageRole,
    /// Turn text
    pub content: String,
}

impl Message {
    /// Construct a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Construct a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Construct an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Inbound request from the transport layer
///
/// Exactly one `stream_message` call runs per request; `message_id` addresses
/// every emitted [`crate::streaming::StreamEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Conversation the request belongs to
    pub conversation_id: String,
    /// Requesting user
    pub user_id: String,
    /// Id the streamed events are addressed to
    pub message_id: String,
    /// Conversation history, oldest first
    pub history: Vec<Message>,
    /// Explicit model override, bypassing preferences
    pub model_override: Option<String>,
    /// System prompt prepended to the history
    pub system_prompt: Option<String>,
    /// Output token cap
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Parameters handed to a provider adapter for one attempt
#[derive(Debug, Clone)]
pub struct SendMessageParams {
    /// Model to invoke
    pub model: String,
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    /// System prompt, if any
    pub system_prompt: Option<String>,
    /// Output token cap
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Token accounting for one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed
    pub input: u64,
    /// Completion tokens produced
    pub output: u64,
    /// Input + output
    pub total: u64,
}

impl TokenUsage {
    /// Build usage from input/output counts
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// Dollar cost of one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Cost attributed to input tokens
    pub input: f64,
    /// Cost attributed to output tokens
    pub output: f64,
    /// Input + output
    pub total: f64,
    /// Currency code
    pub currency: String,
}

impl Cost {
    /// Build a USD cost from input/output components
    pub fn usd(input: f64, output: f64) -> Self {
        Self {
            input,
            output,
            total: input + output,
            currency: "USD".to_string(),
        }
    }

    /// A zero-dollar cost
    pub fn zero() -> Self {
        Self::usd(0.0, 0.0)
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn
    EndTurn,
    /// Output token cap reached
    MaxTokens,
    /// A stop sequence matched
    StopSequence,
    /// Safety filter intervened
    ContentFilter,
}

/// Final structured result of one call, returned alongside the event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    /// Full response text
    pub content: String,
    /// Token accounting
    pub token_usage: TokenUsage,
    /// Dollar cost
    pub cost: Cost,
    /// Model that produced the response
    pub model: String,
    /// Why generation stopped
    pub stop_reason: StopReason,
    /// Provider that served the request
    pub provider: ProviderType,
}
