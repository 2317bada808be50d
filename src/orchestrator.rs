//! Inference orchestration: cache in front of the engine.
//!
//! The orchestrator composes the response cache and the model engine
//! for both blocking and streaming callers: fingerprint lookup → hit
//! serves from cache (replayed as paced fragments for streams) → miss
//! takes the generation lock, drives the engine, and writes the result
//! through under the same fingerprint.
//!
//! # Locking
//!
//! The native inference call is synchronous and compute-bound, so calls
//! into the engine must never overlap. A `tokio::sync::Mutex` guards
//! generation; for streams the owned guard moves into the pump task and
//! is held until the stream finishes or the consumer disconnects.
//!
//! # Cancellation
//!
//! The pump forwards fragments through a bounded channel of one. When
//! the consumer drops the stream, the next send fails, the pump stops
//! pulling from the engine, and no cache write happens — a cancelled
//! generation must never cache a truncated answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;

use crate::Result;
use crate::cache::{Fingerprint, ResponseCache};
use crate::engine::{CompletionEngine, FragmentStream};
use crate::telemetry;
use crate::types::GenerationOptions;

/// Default pause between fragments when replaying a cached response.
pub const DEFAULT_REPLAY_DELAY: Duration = Duration::from_millis(10);

/// A completed blocking generation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub cached: bool,
}

/// A streaming generation: whether it replays the cache, plus the
/// fragment stream itself.
pub struct StreamedCompletion {
    pub cached: bool,
    pub fragments: FragmentStream,
}

/// Single entry point combining cache, lock, and engine.
pub struct InferenceOrchestrator {
    engine: Arc<dyn CompletionEngine>,
    cache: Option<ResponseCache>,
    generation_lock: Arc<Mutex<()>>,
    replay_delay: Duration,
}

impl InferenceOrchestrator {
    /// Create an orchestrator around an engine, optionally fronted by a
    /// response cache (`None` disables caching entirely).
    pub fn new(engine: Arc<dyn CompletionEngine>, cache: Option<ResponseCache>) -> Self {
        Self {
            engine,
            cache,
            generation_lock: Arc::new(Mutex::new(())),
            replay_delay: DEFAULT_REPLAY_DELAY,
        }
    }

    /// Set the pacing delay for cached replay.
    pub fn replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// The engine this orchestrator drives.
    pub fn engine(&self) -> &Arc<dyn CompletionEngine> {
        &self.engine
    }

    /// Blocking completion.
    ///
    /// The fingerprint must be derived from the *raw* user prompt, not
    /// the assembled one — that is what keeps cache hits stable across
    /// prompt-template changes.
    pub async fn complete(
        &self,
        fingerprint: &Fingerprint,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let started = Instant::now();

        if let Some(cache) = &self.cache {
            if let Some(text) = cache.get(fingerprint, "complete").await {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete", "status" => "ok")
                    .increment(1);
                return Ok(Completion { text, cached: true });
            }
        }

        let generated = {
            let _guard = self.generation_lock.lock().await;
            self.engine.generate(prompt, options).await
        };

        match generated {
            Ok(text) => {
                if let Some(cache) = &self.cache {
                    cache.insert(fingerprint, &text).await;
                }
                metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete", "status" => "ok")
                    .increment(1);
                metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => "complete")
                    .record(started.elapsed().as_secs_f64());
                metrics::counter!(telemetry::TOKENS_TOTAL)
                    .increment(text.split_whitespace().count() as u64);
                Ok(Completion {
                    text,
                    cached: false,
                })
            }
            Err(err) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete", "status" => "error")
                    .increment(1);
                Err(err)
            }
        }
    }

    /// Streaming completion.
    ///
    /// Cache hits replay the stored text as word-boundary fragments with
    /// the configured pacing delay; misses drive the engine, accumulate
    /// the fragments, and write the full text through on clean stream
    /// completion only.
    pub async fn complete_stream(
        &self,
        fingerprint: &Fingerprint,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<StreamedCompletion> {
        if let Some(cache) = &self.cache {
            if let Some(text) = cache.get(fingerprint, "complete_stream").await {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete_stream", "status" => "ok")
                    .increment(1);
                return Ok(StreamedCompletion {
                    cached: true,
                    fragments: replay_fragments(text, self.replay_delay),
                });
            }
        }

        // The owned guard rides along in the pump task: the engine stays
        // locked until this stream completes or its consumer disconnects.
        let guard = Arc::clone(&self.generation_lock).lock_owned().await;
        let inner = match self.engine.stream(prompt, options).await {
            Ok(inner) => inner,
            Err(err) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete_stream", "status" => "error")
                    .increment(1);
                return Err(err);
            }
        };

        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let cache = self.cache.clone();
        let fingerprint = fingerprint.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let mut inner = inner;
            let mut full = String::new();

            while let Some(item) = inner.next().await {
                let errored = item.is_err();
                if let Ok(fragment) = &item {
                    full.push_str(fragment);
                }
                if tx.send(item).await.is_err() {
                    tracing::debug!("stream consumer disconnected, abandoning generation");
                    return; // no cache write for cancelled generations
                }
                if errored {
                    metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete_stream", "status" => "error")
                        .increment(1);
                    return; // no cache write for failed generations
                }
            }

            if let Some(cache) = &cache {
                if !full.is_empty() {
                    cache.insert(&fingerprint, &full).await;
                }
            }
            metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => "complete_stream", "status" => "ok")
                .increment(1);
            metrics::counter!(telemetry::TOKENS_TOTAL)
                .increment(full.split_whitespace().count() as u64);
        });

        Ok(StreamedCompletion {
            cached: false,
            fragments: Box::pin(ReceiverStream::new(rx)),
        })
    }
}

/// Replay cached text as word-boundary fragments: first fragment is the
/// first word, each later fragment is `" "` plus the next word, with a
/// timer-delayed send between them (never a blocking sleep).
fn replay_fragments(text: String, delay: Duration) -> FragmentStream {
    let (tx, rx) = tokio::sync::mpsc::channel(1);

    tokio::spawn(async move {
        for (i, word) in text.split(' ').enumerate() {
            let fragment = if i == 0 {
                word.to_string()
            } else {
                format!(" {word}")
            };
            tokio::time::sleep(delay).await;
            if tx.send(Ok(fragment)).await.is_err() {
                break; // receiver dropped
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
