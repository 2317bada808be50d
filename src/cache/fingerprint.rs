//! Deterministic cache keys.

use crate::types::GenerationOptions;

/// Deterministic cache key for a completion request.
///
/// Built from a canonical JSON serialization of the logical request
/// identity: keys sorted (serde_json's map is BTreeMap-backed), the
/// prompt whitespace-trimmed, absent optional parameters normalized to
/// `null`. The canonical string is used directly as the key — same
/// logical inputs always yield byte-identical keys, across processes,
/// which a hasher-based key would not guarantee.
///
/// The prompt here is the caller's *raw* text, never the assembled
/// prompt: formatting is incidental, meaning is what the cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for one request.
    pub fn new(
        user_id: &str,
        session_id: &str,
        raw_prompt: &str,
        options: &GenerationOptions,
    ) -> Self {
        let canonical = serde_json::json!({
            "max_tokens": options.max_tokens,
            "prompt": raw_prompt.trim(),
            "session_id": session_id,
            "temperature": options.temperature,
            "user_id": user_id,
        });
        Self(canonical.to_string())
    }

    /// The canonical key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GenerationOptions {
        GenerationOptions::new().max_tokens(50).temperature(0.7)
    }

    #[test]
    fn fingerprint_deterministic() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s1", "Ping", &options());
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_whitespace_is_normalized() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s1", "  Ping \n", &options());
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_user() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u2", "s1", "Ping", &options());
        assert_ne!(a, b);
    }

    #[test]
    fn differs_on_session() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s2", "Ping", &options());
        assert_ne!(a, b);
    }

    #[test]
    fn differs_on_prompt() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s1", "Pong", &options());
        assert_ne!(a, b);
    }

    #[test]
    fn differs_on_max_tokens() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s1", "Ping", &options().max_tokens(51));
        assert_ne!(a, b);
    }

    #[test]
    fn differs_on_temperature() {
        let a = Fingerprint::new("u1", "s1", "Ping", &options());
        let b = Fingerprint::new("u1", "s1", "Ping", &options().temperature(0.9));
        assert_ne!(a, b);
    }

    #[test]
    fn absent_params_are_null_sentinels() {
        let fp = Fingerprint::new("u1", "s1", "Ping", &GenerationOptions::new());
        assert!(fp.as_str().contains("\"max_tokens\":null"));
        assert!(fp.as_str().contains("\"temperature\":null"));
    }

    #[test]
    fn absent_differs_from_explicit() {
        let absent = Fingerprint::new("u1", "s1", "Ping", &GenerationOptions::new());
        let explicit = Fingerprint::new("u1", "s1", "Ping", &GenerationOptions::new().max_tokens(512));
        assert_ne!(absent, explicit);
    }
}
