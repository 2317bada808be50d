//! Prompt assembly.
//!
//! Two pieces:
//!
//! - [`estimate::estimate_tokens`] — cheap language-aware token
//!   approximation used to bound prompt size without the model's real
//!   tokenizer.
//!
//! - [`builder::ContextWindow`] — assembles a role-tagged prompt from a
//!   system prompt, a budget-trimmed slice of history, and the new user
//!   message. The system section and the new message are load-bearing
//!   and are never dropped; history is trimmed newest-first with an
//!   all-or-nothing decision per turn.

pub mod builder;
pub mod estimate;

pub use builder::{ContextWindow, PromptAssembly};
pub use estimate::estimate_tokens;

use std::path::Path;

/// Substituted whenever the system prompt file is absent or unreadable.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Load the system prompt from a text file.
///
/// Any failure (missing file, bad encoding) substitutes
/// [`DEFAULT_SYSTEM_PROMPT`] — a missing prompt file is never a hard
/// failure.
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            tracing::debug!("system prompt not loaded from {:?} ({err}), using default", path);
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn missing_file_substitutes_default() {
        let prompt = load_system_prompt(Path::new("/nonexistent/prompt.txt"));
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn file_contents_are_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  You are a pirate.  ").unwrap();
        let prompt = load_system_prompt(file.path());
        assert_eq!(prompt, "You are a pirate.");
    }
}
