//! Response and streaming event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-streaming chat reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub message_id: String,
    pub session_id: String,
    pub response_text: String,
    /// Whitespace-word count of the reply (compatibility metric, not a
    /// tokenizer-accurate count).
    pub tokens_used: u32,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted during a streaming completion.
///
/// Lifecycle invariant: exactly one `Start` before any `Token`, then
/// exactly one terminal event (`Done` or `Error`). The
/// [`EventSequencer`](crate::transport::EventSequencer) enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Stream opened; identifies the session and the assistant message.
    Start {
        session_id: String,
        message_id: String,
    },

    /// One generated (or replayed) text fragment.
    Token { content: String },

    /// Generation complete; the assistant turn has been persisted (or the
    /// failure to do so logged).
    Done {
        tokens_used: u32,
        cached: bool,
        timestamp: DateTime<Utc>,
    },

    /// Generation failed mid-stream. Terminal; no `Done` follows.
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
