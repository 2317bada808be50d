//! Placeholder engine used when no model is available.

use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

use crate::Result;
use crate::config::EngineConfig;
use crate::telemetry;
use crate::types::GenerationOptions;

use super::{CompletionEngine, EngineInfo, FragmentStream};

/// Longest excerpt of the user's message quoted in the placeholder.
const EXCERPT_MAX_CHARS: usize = 50;

/// Pause between replayed words so the stream still reads as live.
const WORD_DELAY: Duration = Duration::from_millis(50);

/// Engine variant that answers every request with a deterministic,
/// clearly-marked placeholder embedding an excerpt of the user's
/// message. Selected by [`init`](super::init) when the real model
/// cannot be loaded, so a missing model degrades a response instead of
/// failing the request.
pub struct FallbackEngine {
    config: EngineConfig,
}

impl FallbackEngine {
    /// Create a fallback engine reporting the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The placeholder response for an assembled prompt.
    pub fn placeholder(prompt: &str) -> String {
        format!(
            "[model unavailable] Could not process: '{}'. No language model is loaded.",
            user_excerpt(prompt)
        )
    }
}

/// Recover a short excerpt of the user's message from the assembled
/// prompt's role markup.
fn user_excerpt(prompt: &str) -> String {
    const USER_HEADER: &str = "<|im_start|>user";
    let tail = match prompt.rfind(USER_HEADER) {
        Some(idx) => &prompt[idx + USER_HEADER.len()..],
        None => return "your question".to_string(),
    };
    let message = tail.split("<|im_end|>").next().unwrap_or(tail).trim();
    if message.is_empty() {
        return "your question".to_string();
    }
    message.chars().take(EXCERPT_MAX_CHARS).collect()
}

#[async_trait]
impl CompletionEngine for FallbackEngine {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        metrics::counter!(telemetry::ENGINE_FALLBACKS_TOTAL).increment(1);
        Ok(Self::placeholder(prompt))
    }

    async fn stream(&self, prompt: &str, _options: &GenerationOptions) -> Result<FragmentStream> {
        metrics::counter!(telemetry::ENGINE_FALLBACKS_TOTAL).increment(1);
        let text = Self::placeholder(prompt);
        let (tx, rx) = tokio::sync::mpsc::channel(1);

        tokio::spawn(async move {
            for (i, word) in text.split(' ').enumerate() {
                let fragment = if i == 0 {
                    word.to_string()
                } else {
                    format!(" {word}")
                };
                tokio::time::sleep(WORD_DELAY).await;
                if tx.send(Ok(fragment)).await.is_err() {
                    break; // receiver dropped
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn info(&self) -> EngineInfo {
        EngineInfo::from_config(&self.config, false)
    }
}
