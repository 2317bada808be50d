//! Approximate token counting.

/// Approximate the token count of `text`.
///
/// Whitespace-delimited words plus a weight of 2 per CJK codepoint —
/// CJK text tokenizes denser than Latin scripts, and a whitespace split
/// alone would undercount it badly. Order-of-magnitude accurate against
/// real tokenizers, which is enough to keep prompts inside the context
/// window; exactness is not the goal.
///
/// Runs in O(len). Empty text estimates to 0.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let words = text.split_whitespace().count();
    cjk * 2 + words
}

/// CJK Unified Ideographs block.
fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
