//! Raw model output sanitization.
//!
//! Local chat models leak: inline `<think>` reasoning spans, stray
//! end-of-turn markup, chain-of-thought phrasing that should never have
//! surfaced, and stuttered duplicate lines. [`Sanitizer`] scrubs all of
//! it before text reaches the cache or the caller.
//!
//! The leak-phrase list is data, not control flow — pass a custom list
//! to [`Sanitizer::with_patterns`] to tune it without touching the
//! sanitizer itself.

use futures_util::StreamExt;
use regex::{Regex, RegexBuilder};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{MuninnError, Result};

use super::FragmentStream;

/// Line-level phrases that indicate leaked chain-of-thought rather than
/// a final answer. Matched case-insensitively anywhere in the line.
pub const DEFAULT_LEAK_PATTERNS: &[&str] = &[
    r"let me",
    r"i need to",
    r"i remember",
    r"wait[, ]",
    r"first[, ]",
    r"maybe",
    r"another thing",
    r"i'm trying to",
    r"now,",
    r"let's",
    r"in conclusion",
];

/// Scrubs raw model output.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    reasoning_span: Regex,
    artifacts: Vec<Regex>,
    leak_lines: Regex,
}

impl Sanitizer {
    /// Sanitizer with the default leak-pattern list.
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_LEAK_PATTERNS).expect("default leak patterns compile")
    }

    /// Sanitizer with a custom leak-pattern list.
    ///
    /// Returns a configuration error if any pattern fails to compile.
    pub fn with_patterns(patterns: &[&str]) -> Result<Self> {
        let reasoning_span = RegexBuilder::new(r"<think>.*?</think>")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| MuninnError::Configuration(e.to_string()))?;

        let artifacts = [r"</\|im_end>>", r"<\|im_end\|>"]
            .iter()
            .map(|p| Regex::new(p).map_err(|e| MuninnError::Configuration(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let leak_lines = RegexBuilder::new(&format!("({})", patterns.join("|")))
            .case_insensitive(true)
            .build()
            .map_err(|e| MuninnError::Configuration(e.to_string()))?;

        Ok(Self {
            reasoning_span,
            artifacts,
            leak_lines,
        })
    }

    /// Scrub one complete response.
    ///
    /// Strips reasoning spans, removes markup artifacts, drops blank and
    /// leak-pattern lines, deduplicates exact-repeat lines preserving
    /// first occurrence, rejoins and trims. Idempotent: sanitizing
    /// already-sanitized text is a no-op.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut text = self.reasoning_span.replace_all(text, "").into_owned();
        for artifact in &self.artifacts {
            text = artifact.replace_all(&text, "").into_owned();
        }

        let mut seen: Vec<String> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || self.leak_lines.is_match(line) {
                continue;
            }
            if seen.iter().any(|kept| kept == line) {
                continue;
            }
            seen.push(line.to_string());
        }

        seen.join("\n").trim().to_string()
    }

    /// Whether a fragment is nothing but a bare reasoning marker.
    ///
    /// Such fragments are suppressed from streams entirely — never
    /// emitted, never counted.
    pub fn is_reasoning_marker(fragment: &str) -> bool {
        matches!(
            fragment.trim().to_lowercase().as_str(),
            "<think>" | "</think>"
        )
    }

    /// Wrap a raw token stream with streaming sanitization.
    ///
    /// The first emitted fragment goes through [`clean`](Self::clean)
    /// (stripping any reasoning-marker prefix the model opened with);
    /// later fragments pass through verbatim except bare marker
    /// fragments, which are dropped. Errors pass through unchanged.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (called within an async fn).
    pub fn clean_stream(&self, inner: FragmentStream) -> FragmentStream {
        let sanitizer = self.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(1);

        tokio::spawn(async move {
            let mut inner = inner;
            let mut first = true;
            while let Some(item) = inner.next().await {
                let item = match item {
                    Ok(fragment) => {
                        if fragment.is_empty() || Self::is_reasoning_marker(&fragment) {
                            continue;
                        }
                        if first {
                            first = false;
                            let cleaned = sanitizer.clean(&fragment);
                            if cleaned.is_empty() {
                                continue;
                            }
                            Ok(cleaned)
                        } else {
                            Ok(fragment)
                        }
                    }
                    Err(err) => Err(err),
                };
                if tx.send(item).await.is_err() {
                    break; // receiver dropped
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reasoning_span() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.clean("<think>reasoning...</think>Answer: 4");
        assert_eq!(out, "Answer: 4");
    }

    #[test]
    fn strips_multiline_reasoning_span() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.clean("<think>step one\nstep two</think>\nParis.");
        assert_eq!(out, "Paris.");
    }

    #[test]
    fn removes_end_of_turn_artifacts() {
        let sanitizer = Sanitizer::new();
        assert_eq!(sanitizer.clean("Done.<|im_end|>"), "Done.");
    }

    #[test]
    fn drops_leak_pattern_lines() {
        let sanitizer = Sanitizer::new();
        let raw = "Let me think about this.\nThe answer is 4.\nIn conclusion, it's 4.";
        assert_eq!(sanitizer.clean(raw), "The answer is 4.");
    }

    #[test]
    fn deduplicates_lines_preserving_order() {
        let sanitizer = Sanitizer::new();
        let raw = "alpha\nbeta\nalpha\ngamma\nbeta";
        assert_eq!(sanitizer.clean(raw), "alpha\nbeta\ngamma");
    }

    #[test]
    fn drops_blank_lines() {
        let sanitizer = Sanitizer::new();
        assert_eq!(sanitizer.clean("one\n\n\ntwo\n"), "one\ntwo");
    }

    #[test]
    fn idempotent() {
        let sanitizer = Sanitizer::new();
        let raw = "<think>hm</think>alpha\nalpha\nWait, no.\nbeta";
        let once = sanitizer.clean(raw);
        let twice = sanitizer.clean(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_is_empty() {
        let sanitizer = Sanitizer::new();
        assert_eq!(sanitizer.clean(""), "");
    }

    #[test]
    fn custom_patterns() {
        let sanitizer = Sanitizer::with_patterns(&["forbidden phrase"]).unwrap();
        let out = sanitizer.clean("keep this\nthe forbidden phrase line");
        assert_eq!(out, "keep this");
        // default patterns no longer apply
        assert_eq!(sanitizer.clean("Let me explain."), "Let me explain.");
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        assert!(Sanitizer::with_patterns(&["(unclosed"]).is_err());
    }

    #[test]
    fn marker_fragments_detected() {
        assert!(Sanitizer::is_reasoning_marker("<think>"));
        assert!(Sanitizer::is_reasoning_marker("  </THINK>  "));
        assert!(!Sanitizer::is_reasoning_marker("think"));
    }
}
