//! Server-push event framing.
//!
//! [`EventSequencer`] is the lifecycle state machine for one streaming
//! response: `Idle → Started → Emitting* → Terminal`. It guarantees
//! exactly one `Start` before any `Token` and exactly one terminal
//! event; a transition that would break the invariant yields nothing
//! instead of a malformed sequence.
//!
//! [`sse_frame`] encodes events for the wire: one JSON object per
//! event, framed as a `data:` block terminated by a blank line, served
//! under [`EVENT_STREAM_CONTENT_TYPE`] with caching disabled.

use chrono::{DateTime, Utc};

use crate::Result;
use crate::types::StreamEvent;

/// Content type for the event stream response.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Cache-Control value for the event stream response.
pub const EVENT_STREAM_CACHE_CONTROL: &str = "no-cache";

/// Encode one event as an SSE frame: `data: {json}\n\n`.
pub fn sse_frame(event: &StreamEvent) -> Result<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Started,
    Terminal,
}

/// Lifecycle state machine for one streaming response.
#[derive(Debug)]
pub struct EventSequencer {
    state: StreamState,
}

impl EventSequencer {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
        }
    }

    /// Open the stream. Valid only once, before anything else.
    pub fn start(&mut self, session_id: String, message_id: String) -> Option<StreamEvent> {
        match self.state {
            StreamState::Idle => {
                self.state = StreamState::Started;
                Some(StreamEvent::Start {
                    session_id,
                    message_id,
                })
            }
            _ => None,
        }
    }

    /// Emit a content fragment. Valid only between start and terminal.
    pub fn token(&mut self, content: String) -> Option<StreamEvent> {
        match self.state {
            StreamState::Started => Some(StreamEvent::Token { content }),
            _ => None,
        }
    }

    /// Close the stream successfully. Valid only once, after start.
    pub fn finish(
        &mut self,
        tokens_used: u32,
        cached: bool,
        timestamp: DateTime<Utc>,
    ) -> Option<StreamEvent> {
        match self.state {
            StreamState::Started => {
                self.state = StreamState::Terminal;
                Some(StreamEvent::Done {
                    tokens_used,
                    cached,
                    timestamp,
                })
            }
            _ => None,
        }
    }

    /// Close the stream with an error. Valid only once, after start —
    /// failures before the stream opened are request-level errors, not
    /// stream events.
    pub fn fail(&mut self, message: String) -> Option<StreamEvent> {
        match self.state {
            StreamState::Started => {
                self.state = StreamState::Terminal;
                Some(StreamEvent::Error { message })
            }
            _ => None,
        }
    }

    /// Whether the stream has ended.
    pub fn is_terminal(&self) -> bool {
        self.state == StreamState::Terminal
    }
}

impl Default for EventSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_sequence() {
        let mut seq = EventSequencer::new();
        assert!(seq.start("s".into(), "m".into()).is_some());
        assert!(seq.token("hello".into()).is_some());
        assert!(seq.token(" world".into()).is_some());
        assert!(seq.finish(2, false, Utc::now()).is_some());
        assert!(seq.is_terminal());
    }

    #[test]
    fn token_before_start_is_rejected() {
        let mut seq = EventSequencer::new();
        assert!(seq.token("early".into()).is_none());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut seq = EventSequencer::new();
        assert!(seq.start("s".into(), "m".into()).is_some());
        assert!(seq.start("s".into(), "m2".into()).is_none());
    }

    #[test]
    fn only_one_terminal_event() {
        let mut seq = EventSequencer::new();
        seq.start("s".into(), "m".into());
        assert!(seq.fail("boom".into()).is_some());
        assert!(seq.finish(0, false, Utc::now()).is_none());
        assert!(seq.token("late".into()).is_none());
    }

    #[test]
    fn error_before_start_is_not_a_stream_event() {
        let mut seq = EventSequencer::new();
        assert!(seq.fail("pre-start".into()).is_none());
    }

    #[test]
    fn frame_encoding() {
        let frame = sse_frame(&StreamEvent::Token {
            content: "hi".into(),
        })
        .unwrap();
        assert_eq!(frame, "data: {\"type\":\"token\",\"content\":\"hi\"}\n\n");
    }

    #[test]
    fn start_frame_carries_ids() {
        let frame = sse_frame(&StreamEvent::Start {
            session_id: "s1".into(),
            message_id: "m1".into(),
        })
        .unwrap();
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains("\"type\":\"start\""));
        assert!(frame.contains("\"session_id\":\"s1\""));
        assert!(frame.contains("\"message_id\":\"m1\""));
    }
}
