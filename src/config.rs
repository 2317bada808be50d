//! Configuration for the engine and the chat service.
//!
//! Plain structs with `Default` impls; no config-file parsing lives here.
//! Embedding layers (HTTP servers, CLIs) deserialize into these from
//! whatever source they use.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the model engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the GGUF model file.
    pub model_path: PathBuf,

    /// Context window size in tokens.
    pub n_ctx: u32,

    /// Layers offloaded to GPU (0 = CPU only).
    pub n_gpu_layers: u32,

    /// Default max tokens when a request does not override it.
    pub max_tokens: usize,

    /// Default sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling threshold.
    pub top_p: f32,

    /// Top-k sampling: only consider the k most likely tokens.
    pub top_k: u32,

    /// Sequences where generation must stop. Role-boundary and
    /// end-of-turn markers so the model never hallucinates the next turn.
    pub stop_sequences: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: std::env::var("MUNINN_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::data_dir()
                        .unwrap_or_else(|| PathBuf::from(".data"))
                        .join("muninn")
                        .join("model.gguf")
                }),
            n_ctx: 2048,
            n_gpu_layers: 0,
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            stop_sequences: default_stop_sequences(),
        }
    }
}

/// The markup boundaries generation must never cross.
pub fn default_stop_sequences() -> Vec<String> {
    vec![
        "<|im_start|>user".to_string(),
        "<|im_start|>assistant".to_string(),
        "<|im_end|>".to_string(),
        "</s>".to_string(),
    ]
}

/// Configuration for the chat service request flow.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Total tokens the model accepts as input (context budget for
    /// prompt assembly; usually equals the engine's `n_ctx`).
    pub context_budget: usize,

    /// Tokens held back from the budget to guarantee room for the reply.
    pub reserved_margin: usize,

    /// Path to the system prompt text file. A missing or unreadable file
    /// substitutes the fixed default prompt, never an error.
    pub system_prompt_path: PathBuf,

    /// Pause between fragments when replaying a cached response, so a
    /// cache hit still reads as a live stream.
    pub replay_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            context_budget: 2048,
            reserved_margin: 512,
            system_prompt_path: PathBuf::from("prompt.txt"),
            replay_delay: Duration::from_millis(10),
        }
    }
}
