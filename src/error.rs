//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Request errors
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("access denied to session {0}")]
    Forbidden(String),

    /// Raised by the session store when a message append targets a session
    /// the caller does not own. Fatal for the user turn; for the assistant
    /// turn the reply was already produced, so callers log and continue.
    #[error("validation failed: {0}")]
    Validation(String),

    // Engine errors
    /// Model not loaded or the native call failed. Blocking generation
    /// degrades to a placeholder instead of surfacing this to callers.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
