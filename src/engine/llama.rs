//! llama-cpp-2 engine.
//!
//! llama-cpp types (`LlamaBackend`, `LlamaModel`, `LlamaContext`) hold
//! raw pointers that are not `Send`, so all native work runs on one
//! dedicated worker thread that owns the backend and the model. The
//! async side talks to it over channels: commands in via std mpsc,
//! tokens out via a bounded tokio channel (`blocking_send` from the
//! worker, so a slow or departed consumer stops generation instead of
//! buffering it).
//!
//! The single worker thread is also what serializes native inference
//! calls for the whole process.

use std::num::NonZeroU32;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::EngineConfig;
use crate::error::{MuninnError, Result};
use crate::telemetry;
use crate::types::GenerationOptions;

use super::fallback::FallbackEngine;
use super::sanitize::Sanitizer;
use super::{CompletionEngine, EngineInfo, FragmentStream};

/// Resolved sampling parameters for one generation.
#[derive(Debug, Clone)]
struct SamplingParams {
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

enum WorkerCommand {
    Generate {
        prompt: String,
        params: SamplingParams,
        token_tx: tokio::sync::mpsc::Sender<Result<String>>,
    },
    Shutdown,
}

/// Engine variant driving a GGUF model through llama-cpp-2.
///
/// Constructed by [`load`](Self::load), which fails (and lets
/// [`init`](super::init) fall back) when the model file is missing or
/// the native load fails. A native failure *during* blocking generation
/// degrades to the placeholder response instead; mid-stream failures
/// surface as stream errors.
pub struct LlamaEngine {
    command_tx: Sender<WorkerCommand>,
    worker: Option<JoinHandle<()>>,
    sanitizer: Sanitizer,
    config: EngineConfig,
}

impl LlamaEngine {
    /// Load the model and start the worker thread.
    pub fn load(config: EngineConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(MuninnError::EngineUnavailable(format!(
                "model file not found: {:?}",
                config.model_path
            )));
        }

        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let worker_config = config.clone();
        let worker = std::thread::spawn(move || {
            worker_thread_main(worker_config, command_rx, ready_tx);
        });

        ready_rx
            .recv()
            .map_err(|_| MuninnError::EngineUnavailable("worker thread died during load".into()))??;

        tracing::info!("llama worker thread started");
        Ok(Self {
            command_tx,
            worker: Some(worker),
            sanitizer: Sanitizer::new(),
            config,
        })
    }

    fn resolve_params(&self, options: &GenerationOptions) -> SamplingParams {
        SamplingParams {
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: options.temperature.unwrap_or(self.config.temperature),
            top_p: self.config.top_p,
            top_k: self.config.top_k,
        }
    }

    /// Dispatch a generation to the worker and return the raw (not yet
    /// sanitized) token receiver.
    fn raw_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<String>>> {
        let (token_tx, token_rx) = tokio::sync::mpsc::channel(1);
        self.command_tx
            .send(WorkerCommand::Generate {
                prompt: prompt.to_string(),
                params: self.resolve_params(options),
                token_tx,
            })
            .map_err(|_| MuninnError::EngineUnavailable("worker thread exited".into()))?;
        Ok(token_rx)
    }
}

#[async_trait]
impl CompletionEngine for LlamaEngine {
    fn name(&self) -> &str {
        "llama"
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let mut token_rx = self.raw_stream(prompt, options)?;
        let mut full = String::new();
        while let Some(item) = token_rx.recv().await {
            match item {
                Ok(piece) => full.push_str(&piece),
                Err(err) => {
                    tracing::warn!("generation failed ({err}); returning placeholder");
                    metrics::counter!(telemetry::ENGINE_FALLBACKS_TOTAL).increment(1);
                    return Ok(FallbackEngine::placeholder(prompt));
                }
            }
        }
        Ok(self.sanitizer.clean(&full))
    }

    async fn stream(&self, prompt: &str, options: &GenerationOptions) -> Result<FragmentStream> {
        let token_rx = self.raw_stream(prompt, options)?;
        let raw: FragmentStream = Box::pin(ReceiverStream::new(token_rx));
        Ok(self.sanitizer.clean_stream(raw))
    }

    fn info(&self) -> EngineInfo {
        EngineInfo::from_config(&self.config, true)
    }
}

impl Drop for LlamaEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker thread main loop. Owns the backend and the model; processes
/// commands sequentially, which serializes all native inference.
fn worker_thread_main(
    config: EngineConfig,
    command_rx: mpsc::Receiver<WorkerCommand>,
    ready_tx: Sender<Result<()>>,
) {
    let backend = match LlamaBackend::init() {
        Ok(backend) => backend,
        Err(err) => {
            let _ = ready_tx.send(Err(MuninnError::EngineUnavailable(err.to_string())));
            return;
        }
    };

    let model_params = LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers);
    let model = match LlamaModel::load_from_file(&backend, &config.model_path, &model_params) {
        Ok(model) => model,
        Err(err) => {
            let _ = ready_tx.send(Err(MuninnError::EngineUnavailable(err.to_string())));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Generate {
                prompt,
                params,
                token_tx,
            }) => {
                if let Err(err) = run_generation(&backend, &model, &config, &prompt, &params, &token_tx)
                {
                    let _ = token_tx.blocking_send(Err(MuninnError::Stream(err)));
                }
            }
            Ok(WorkerCommand::Shutdown) | Err(_) => {
                tracing::debug!("llama worker shutting down");
                break;
            }
        }
    }
}

/// Run one generation, streaming UTF-8 pieces back to the async side.
fn run_generation(
    backend: &LlamaBackend,
    model: &LlamaModel,
    config: &EngineConfig,
    prompt: &str,
    params: &SamplingParams,
    token_tx: &tokio::sync::mpsc::Sender<Result<String>>,
) -> std::result::Result<(), String> {
    let n_ctx = config.n_ctx.min(model.n_ctx_train()).max(512);
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(n_ctx))
        .with_n_batch(512);

    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| format!("failed to create context: {e}"))?;

    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| format!("failed to tokenize: {e}"))?;
    tracing::debug!("prompt tokenized into {} tokens", tokens.len());

    let mut batch = LlamaBatch::new(512, 1);
    for (i, token) in tokens.iter().enumerate() {
        let is_last = i == tokens.len() - 1;
        batch
            .add(*token, i as i32, &[0], is_last)
            .map_err(|e| format!("failed to add token to batch: {e}"))?;
    }
    ctx.decode(&mut batch)
        .map_err(|e| format!("failed to decode prompt: {e}"))?;

    let mut sampler = if params.temperature < 0.01 {
        LlamaSampler::greedy()
    } else {
        LlamaSampler::chain_simple([
            LlamaSampler::top_k(params.top_k as i32),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(rand_seed()),
        ])
    };

    let mut n_decoded = tokens.len() as i32;
    let mut utf8_buffer: Vec<u8> = Vec::new();
    let mut stops = StopWatch::new(&config.stop_sequences);

    for _ in 0..params.max_tokens {
        let new_token = sampler.sample(&ctx, batch.n_tokens() - 1);
        sampler.accept(new_token);

        if model.is_eog_token(new_token) {
            break;
        }

        let token_bytes = model
            .token_to_bytes(new_token, Special::Tokenize)
            .map_err(|e| format!("failed to convert token to bytes: {e}"))?;
        utf8_buffer.extend_from_slice(&token_bytes);

        // Emit the longest valid UTF-8 prefix; keep incomplete bytes.
        let piece = take_valid_utf8(&mut utf8_buffer);
        if !piece.is_empty() {
            let (emit, stopped) = stops.push(&piece);
            if !emit.is_empty() && token_tx.blocking_send(Ok(emit)).is_err() {
                tracing::debug!("receiver dropped, stopping generation");
                return Ok(());
            }
            if stopped {
                return Ok(());
            }
        }

        batch.clear();
        batch
            .add(new_token, n_decoded, &[0], true)
            .map_err(|e| format!("failed to add token to batch: {e}"))?;
        ctx.decode(&mut batch)
            .map_err(|e| format!("failed to decode: {e}"))?;
        n_decoded += 1;
    }

    // Natural end: flush held-back text.
    let remainder = stops.flush();
    if !remainder.is_empty() {
        let _ = token_tx.blocking_send(Ok(remainder));
    }
    Ok(())
}

/// Drain the longest valid UTF-8 prefix from `buffer`.
fn take_valid_utf8(buffer: &mut Vec<u8>) -> String {
    match std::str::from_utf8(buffer) {
        Ok(s) => {
            let s = s.to_string();
            buffer.clear();
            s
        }
        Err(err) => {
            let valid_len = err.valid_up_to();
            let s = String::from_utf8_lossy(&buffer[..valid_len]).into_owned();
            buffer.drain(..valid_len);
            s
        }
    }
}

/// Watches the emitted text for stop sequences, holding back any suffix
/// that could still turn out to be the start of one so callers never see
/// a partial stop marker.
struct StopWatch {
    sequences: Vec<String>,
    max_len: usize,
    pending: String,
}

impl StopWatch {
    fn new(sequences: &[String]) -> Self {
        let max_len = sequences.iter().map(|s| s.len()).max().unwrap_or(0);
        Self {
            sequences: sequences.to_vec(),
            max_len,
            pending: String::new(),
        }
    }

    /// Append `piece`; returns text safe to emit and whether a stop
    /// sequence was reached.
    fn push(&mut self, piece: &str) -> (String, bool) {
        self.pending.push_str(piece);

        if let Some(pos) = self
            .sequences
            .iter()
            .filter_map(|s| self.pending.find(s.as_str()))
            .min()
        {
            let emit = self.pending[..pos].to_string();
            self.pending.clear();
            return (emit, true);
        }

        let keep = self.holdback_len();
        let split = self.pending.len() - keep;
        let emit = self.pending[..split].to_string();
        self.pending.drain(..split);
        (emit, false)
    }

    /// Length of the longest `pending` suffix that is a prefix of some
    /// stop sequence.
    fn holdback_len(&self) -> usize {
        let upper = self.pending.len().min(self.max_len.saturating_sub(1));
        for k in (1..=upper).rev() {
            if !self.pending.is_char_boundary(self.pending.len() - k) {
                continue;
            }
            let suffix = &self.pending[self.pending.len() - k..];
            if self.sequences.iter().any(|s| s.starts_with(suffix)) {
                return k;
            }
        }
        0
    }

    /// Release everything held back (generation ended naturally).
    fn flush(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Random seed from system entropy (the sampler wants a u32).
fn rand_seed() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
