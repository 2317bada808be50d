//! Chat service: the request-level flow.
//!
//! `ChatService` ties the collaborators together for one completion
//! turn: session resolution and ownership checks, exactly-once
//! persistence of both turns, prompt assembly under the context budget,
//! fingerprinting on the raw prompt, and the orchestrator call — as a
//! blocking reply or as a lifecycle-framed event stream.
//!
//! # Failure policy
//!
//! Everything before the first externally visible effect aborts early
//! with a clear error (missing session, foreign session, user-turn
//! persistence failure). Once the reply has been produced, failures
//! only degrade: a lost assistant-turn write is logged, never allowed
//! to hide a successful generation from the user.

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::cache::Fingerprint;
use crate::config::ServiceConfig;
use crate::engine::EngineInfo;
use crate::error::{MuninnError, Result};
use crate::orchestrator::InferenceOrchestrator;
use crate::prompt::{ContextWindow, PromptAssembly, load_system_prompt};
use crate::session::{Principal, SessionRecord, SessionStore, SessionSummary};
use crate::transport::EventSequencer;
use crate::types::{ChatReply, ChatRequest, GenerationOptions, Role, StreamEvent};

/// A lifecycle-framed stream of events for one completion.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// The chat completion service.
pub struct ChatService<S: SessionStore> {
    store: Arc<S>,
    orchestrator: InferenceOrchestrator,
    config: ServiceConfig,
}

/// Everything `send` and `send_stream` share before the engine runs.
struct PreparedTurn {
    session_id: String,
    assembly: PromptAssembly,
    fingerprint: Fingerprint,
    options: GenerationOptions,
}

impl<S: SessionStore + 'static> ChatService<S> {
    /// Create a service over a session store and an orchestrator.
    pub fn new(store: Arc<S>, orchestrator: InferenceOrchestrator, config: ServiceConfig) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Blocking completion.
    pub async fn send(&self, principal: &Principal, request: &ChatRequest) -> Result<ChatReply> {
        let prepared = self.prepare(principal, request).await?;

        let completion = self
            .orchestrator
            .complete(&prepared.fingerprint, &prepared.assembly.text, &prepared.options)
            .await?;

        let tokens_used = word_count(&completion.text);
        if let Err(err) = self
            .store
            .add_message(
                &prepared.session_id,
                &principal.subject_id,
                Role::Assistant,
                &completion.text,
                Some(tokens_used),
            )
            .await
        {
            // The reply was produced; losing the persisted copy must not
            // hide it from the caller.
            tracing::warn!(
                "assistant turn not persisted for session {}: {err}",
                prepared.session_id
            );
        }

        Ok(ChatReply {
            message_id: Uuid::new_v4().to_string(),
            session_id: prepared.session_id,
            response_text: completion.text,
            tokens_used,
            cached: completion.cached,
            timestamp: Utc::now(),
        })
    }

    /// Streaming completion.
    ///
    /// Validation and user-turn persistence happen before this returns:
    /// their failures are request-level errors and no stream starts.
    /// The returned stream then emits exactly one `Start`, the tokens,
    /// and one terminal event.
    pub async fn send_stream(
        &self,
        principal: &Principal,
        request: &ChatRequest,
    ) -> Result<EventStream> {
        let prepared = self.prepare(principal, request).await?;

        let streamed = self
            .orchestrator
            .complete_stream(&prepared.fingerprint, &prepared.assembly.text, &prepared.options)
            .await?;

        let message_id = Uuid::new_v4().to_string();
        let store = Arc::clone(&self.store);
        let user_id = principal.subject_id.clone();
        let session_id = prepared.session_id;
        let cached = streamed.cached;
        let (tx, rx) = tokio::sync::mpsc::channel(1);

        tokio::spawn(async move {
            let mut sequencer = EventSequencer::new();
            let mut fragments = streamed.fragments;
            let mut full = String::new();

            if let Some(event) = sequencer.start(session_id.clone(), message_id) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        full.push_str(&fragment);
                        if let Some(event) = sequencer.token(fragment) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!("stream failed for session {session_id}: {err}");
                        if let Some(event) = sequencer.fail(err.to_string()) {
                            let _ = tx.send(event).await;
                        }
                        return; // no Done after an error
                    }
                }
            }

            let tokens_used = word_count(&full);
            if let Err(err) = store
                .add_message(&session_id, &user_id, Role::Assistant, &full, Some(tokens_used))
                .await
            {
                tracing::warn!("assistant turn not persisted for session {session_id}: {err}");
            }

            if let Some(event) = sequencer.finish(tokens_used, cached, Utc::now()) {
                let _ = tx.send(event).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// All of the principal's sessions, most recently updated first.
    pub async fn history(&self, principal: &Principal) -> Result<Vec<SessionSummary>> {
        self.store.list_sessions(&principal.subject_id).await
    }

    /// One session with its messages; ownership enforced.
    pub async fn session_history(
        &self,
        principal: &Principal,
        session_id: &str,
    ) -> Result<SessionRecord> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| MuninnError::NotFound(session_id.to_string()))?;
        if session.user_id != principal.subject_id {
            return Err(MuninnError::Forbidden(session_id.to_string()));
        }
        Ok(session)
    }

    /// Delete one of the principal's sessions.
    pub async fn delete_session(&self, principal: &Principal, session_id: &str) -> Result<()> {
        if self
            .store
            .delete_session(session_id, &principal.subject_id)
            .await?
        {
            Ok(())
        } else {
            Err(MuninnError::NotFound(session_id.to_string()))
        }
    }

    /// Engine configuration and load-state snapshot.
    pub fn engine_info(&self) -> EngineInfo {
        self.orchestrator.engine().info()
    }

    /// Shared preamble: resolve the session, persist the user turn,
    /// assemble the prompt, derive the fingerprint.
    async fn prepare(&self, principal: &Principal, request: &ChatRequest) -> Result<PreparedTurn> {
        let session_id = self
            .resolve_session(principal, request.session_id.as_deref())
            .await?;

        // Persisted before generation so the turn is never lost; a
        // validation failure here aborts the whole request.
        self.store
            .add_message(
                &session_id,
                &principal.subject_id,
                Role::User,
                &request.prompt,
                None,
            )
            .await?;

        let history = self
            .store
            .get_session(&session_id)
            .await?
            .map(|session| session.messages)
            .unwrap_or_default();
        // Exclude the user turn just appended; it becomes the prompt's
        // user section instead.
        let history = &history[..history.len().saturating_sub(1)];

        let system_prompt = load_system_prompt(&self.config.system_prompt_path);
        let assembly = ContextWindow::new(self.config.context_budget, self.config.reserved_margin)
            .build(history, &system_prompt, &request.prompt);

        let options = request.options();
        let fingerprint = Fingerprint::new(
            &principal.subject_id,
            &session_id,
            &request.prompt,
            &options,
        );

        Ok(PreparedTurn {
            session_id,
            assembly,
            fingerprint,
            options,
        })
    }

    async fn resolve_session(
        &self,
        principal: &Principal,
        requested: Option<&str>,
    ) -> Result<String> {
        match requested {
            None => self.store.create_session(&principal.subject_id).await,
            Some(session_id) => {
                let session = self
                    .store
                    .get_session(session_id)
                    .await?
                    .ok_or_else(|| MuninnError::NotFound(session_id.to_string()))?;
                if session.user_id != principal.subject_id {
                    return Err(MuninnError::Forbidden(session_id.to_string()));
                }
                Ok(session_id.to_string())
            }
        }
    }
}

/// The `tokens_used` metric: a whitespace word count of the final text,
/// computed once. Deliberately not tokenizer-accurate — persisted
/// records and metrics consumers depend on this scale.
fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
