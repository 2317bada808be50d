//! Public types for the Muninn API.

mod message;
mod options;
mod request;
mod response;

pub use message::{ConversationTurn, Role};
pub use options::GenerationOptions;
pub use request::ChatRequest;
pub use response::{ChatReply, StreamEvent};
