//! Muninn - local chat completion service
//!
//! This crate turns an unbounded conversation history plus a new user
//! message into a context-window-bounded prompt, serves it from a
//! response cache when possible, drives a locally hosted model in
//! whole-response or incremental-token mode, sanitizes the raw output,
//! and streams the result while persisting conversation state exactly
//! once per turn.
//!
//! # Blocking Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use muninn::{
//!     CacheConfig, ChatRequest, ChatService, EngineConfig, InferenceOrchestrator,
//!     MemorySessionStore, Principal, ResponseCache, ServiceConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> muninn::Result<()> {
//!     let engine = muninn::engine::init(&EngineConfig::default());
//!     let cache = ResponseCache::new(&CacheConfig::default());
//!     let orchestrator = InferenceOrchestrator::new(engine, Some(cache));
//!     let service = ChatService::new(
//!         Arc::new(MemorySessionStore::new()),
//!         orchestrator,
//!         ServiceConfig::default(),
//!     );
//!
//!     let principal = Principal::new("user-1", "alice");
//!     let reply = service
//!         .send(&principal, &ChatRequest::new("What is the capital of France?"))
//!         .await?;
//!
//!     println!("{}", reply.response_text);
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use futures_util::StreamExt;
//! # use muninn::{ChatRequest, ChatService, EngineConfig, InferenceOrchestrator,
//! #     MemorySessionStore, Principal, ServiceConfig};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> muninn::Result<()> {
//! # let engine = muninn::engine::init(&EngineConfig::default());
//! # let service = ChatService::new(
//! #     Arc::new(MemorySessionStore::new()),
//! #     InferenceOrchestrator::new(engine, None),
//! #     ServiceConfig::default(),
//! # );
//! # let principal = Principal::new("user-1", "alice");
//! let mut events = service
//!     .send_stream(&principal, &ChatRequest::new("Tell me a story"))
//!     .await?;
//!
//! while let Some(event) = events.next().await {
//!     print!("{}", muninn::transport::sse_frame(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, Fingerprint, ResponseCache};
pub use config::{EngineConfig, ServiceConfig};
pub use engine::{CompletionEngine, EngineInfo, FallbackEngine, FragmentStream, Sanitizer};
pub use error::{MuninnError, Result};
pub use orchestrator::{Completion, InferenceOrchestrator, StreamedCompletion};
pub use service::{ChatService, EventStream};
pub use session::{MemorySessionStore, Principal, SessionRecord, SessionStore, SessionSummary};
pub use transport::EventSequencer;
pub use types::{ChatReply, ChatRequest, ConversationTurn, GenerationOptions, Role, StreamEvent};

#[cfg(feature = "llama")]
pub use engine::LlamaEngine;
