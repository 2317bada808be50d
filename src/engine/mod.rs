//! Model engines.
//!
//! [`CompletionEngine`] abstracts over the loaded model, with two
//! implementations selected once at construction time by [`init`]:
//!
//! - [`LlamaEngine`] (feature `llama`) — drives a GGUF model through
//!   llama-cpp-2 on a dedicated worker thread.
//! - [`FallbackEngine`] — always available; answers with a
//!   clearly-marked deterministic placeholder so a missing model never
//!   hard-fails a request.
//!
//! Choosing the variant up front keeps availability sniffing out of
//! call sites: the orchestrator holds one `Arc<dyn CompletionEngine>`
//! for the process lifetime and never asks which kind it got.

pub mod fallback;
#[cfg(feature = "llama")]
pub mod llama;
pub mod sanitize;

pub use fallback::FallbackEngine;
#[cfg(feature = "llama")]
pub use llama::LlamaEngine;
pub use sanitize::Sanitizer;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;

use crate::Result;
use crate::config::EngineConfig;
use crate::types::GenerationOptions;

/// A finite, single-pass stream of sanitized text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Snapshot of the engine's configuration and load state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub model_path: String,
    pub model_loaded: bool,
    pub n_ctx: u32,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl EngineInfo {
    pub(crate) fn from_config(config: &EngineConfig, model_loaded: bool) -> Self {
        Self {
            model_path: config.model_path.to_string_lossy().to_string(),
            model_loaded,
            n_ctx: config.n_ctx,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// The generation interface every engine variant provides.
///
/// Both modes return sanitized text: `generate` cleans the whole
/// response before returning, `stream` cleans the first fragment and
/// suppresses bare reasoning-marker fragments as they pass through.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Engine name for logging/debugging.
    fn name(&self) -> &str;

    /// Blocking generation: the full sanitized response.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Streaming generation. The stream is finite, single-pass and not
    /// restartable; the caller drives consumption.
    async fn stream(&self, prompt: &str, options: &GenerationOptions) -> Result<FragmentStream>;

    /// Configuration and load-state snapshot.
    fn info(&self) -> EngineInfo;
}

/// Construct the best available engine for `config`.
///
/// With the `llama` feature enabled this attempts to load the model and
/// falls back to the placeholder engine when loading fails; without it
/// the placeholder engine is the only variant.
pub fn init(config: &EngineConfig) -> Arc<dyn CompletionEngine> {
    #[cfg(feature = "llama")]
    {
        match LlamaEngine::load(config.clone()) {
            Ok(engine) => {
                tracing::info!("model loaded from {:?}", config.model_path);
                return Arc::new(engine);
            }
            Err(err) => {
                tracing::warn!("model load failed ({err}); using fallback engine");
            }
        }
    }
    Arc::new(FallbackEngine::new(config.clone()))
}
