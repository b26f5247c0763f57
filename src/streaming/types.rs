//! Stream event and state definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Normalized streaming event, addressed to one message id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The stream has begun
    Start {
        /// Message the event belongs to
        message_id: String,
    },
    /// One incremental text fragment
    Delta {
        /// Message the event belongs to
        message_id: String,
        /// Fragment text
        content: String,
        /// Always false for deltas
        is_complete: bool,
    },
    /// Terminal success; carries the full accumulated content, not a delta
    Complete {
        /// Message the event belongs to
        message_id: String,
        /// The entire response text
        content: String,
        /// Always true for completion
        is_complete: bool,
    },
    /// Terminal failure or cancellation
    Error {
        /// Message the event belongs to
        message_id: String,
        /// Human-readable failure description
        message: String,
    },
}

impl StreamEvent {
    /// The message id this event is addressed to
    pub fn message_id(&self) -> &str {
        match self {
            StreamEvent::Start { message_id }
            | StreamEvent::Delta { message_id, .. }
            | StreamEvent::Complete { message_id, .. }
            | StreamEvent::Error { message_id, .. } => message_id,
        }
    }

    /// Whether this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// Stream controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Created, not yet started
    Idle,
    /// Emitting deltas as chunks arrive
    Streaming,
    /// Buffering deltas instead of emitting them
    Paused,
    /// Finished successfully (terminal)
    Completed,
    /// Cancelled by the caller (terminal)
    Cancelled,
    /// Failed (terminal)
    Failed,
}

impl StreamState {
    /// Whether the state is terminal; terminal states are sticky
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Failed
        )
    }
}

/// Stream controller tuning
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Backpressure buffer size; the controller auto-pauses when the consumer
    /// falls this many events behind
    pub max_buffer_size: usize,
    /// Inactivity window after which the stream fails with a timeout.
    /// Also bounds how long a stream may stay paused without new chunks.
    pub inactivity_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 100,
            inactivity_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_message_id_and_terminality() {
        let start = StreamEvent::Start {
            message_id: "m1".to_string(),
        };
        assert_eq!(start.message_id(), "m1");
        assert!(!start.is_terminal());

        let complete = StreamEvent::Complete {
            message_id: "m1".to_string(),
            content: "hello".to_string(),
            is_complete: true,
        };
        assert!(complete.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StreamState::Idle.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert!(!StreamState::Paused.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::Cancelled.is_terminal());
        assert!(StreamState::Failed.is_terminal());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = StreamEvent::Delta {
            message_id: "m1".to_string(),
            content: "hi".to_string(),
            is_complete: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"delta\""));
        assert!(json.contains("\"is_complete\":false"));
    }
}
