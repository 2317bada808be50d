//! Session store collaborator contract.
//!
//! The core never owns conversation persistence: it reads a bounded
//! window of turns and appends new ones through [`SessionStore`]. The
//! trait is the contract a relational backend implements;
//! [`MemorySessionStore`] is the in-process reference implementation
//! (and the test double).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MuninnError, Result};
use crate::types::{ConversationTurn, Role};

/// The authenticated caller, supplied by the embedding layer's auth
/// context. Trusted as-is; the core never re-validates credentials.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject_id: String,
    pub username: String,
}

impl Principal {
    pub fn new(subject_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            username: username.into(),
        }
    }
}

/// A stored chat session with its ordered turns.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ConversationTurn>,
}

/// Listing view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Conversation persistence contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session owned by `user_id`; returns its id.
    async fn create_session(&self, user_id: &str) -> Result<String>;

    /// Fetch a session with its ordered messages, or `None`.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Append a turn to a session.
    ///
    /// Fails with [`MuninnError::Validation`] when the session is absent
    /// or owned by a different user.
    async fn add_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<u32>,
    ) -> Result<()>;

    /// Delete a session owned by `user_id`. Returns whether anything was
    /// deleted; an ownership mismatch reads as "nothing to delete".
    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool>;

    /// All sessions owned by `user_id`, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>>;
}

/// In-memory session store.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, SessionRecord>>> {
        self.sessions
            .read()
            .map_err(|e| MuninnError::Configuration(format!("failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, SessionRecord>>> {
        self.sessions
            .write()
            .map_err(|e| MuninnError::Configuration(format!("failed to acquire write lock: {e}")))
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, user_id: &str) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.write()?.insert(
            session_id.clone(),
            SessionRecord {
                session_id: session_id.clone(),
                user_id: user_id.to_string(),
                created_at: now,
                updated_at: now,
                messages: Vec::new(),
            },
        );
        Ok(session_id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.read()?.get(session_id).cloned())
    }

    async fn add_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<u32>,
    ) -> Result<()> {
        let mut sessions = self.write()?;
        let session = sessions.get_mut(session_id).ok_or_else(|| {
            MuninnError::Validation(format!("unknown session: {session_id}"))
        })?;
        if session.user_id != user_id {
            return Err(MuninnError::Validation(format!(
                "session {session_id} does not belong to user {user_id}"
            )));
        }

        let now = Utc::now();
        session.messages.push(ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: now,
            tokens_used,
        });
        session.updated_at = now;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool> {
        let mut sessions = self.write()?;
        match sessions.get(session_id) {
            Some(session) if session.user_id == user_id => {
                sessions.remove(session_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let sessions = self.read()?;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| SessionSummary {
                session_id: s.session_id.clone(),
                created_at: s.created_at,
                updated_at: s.updated_at,
                message_count: s.messages.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
