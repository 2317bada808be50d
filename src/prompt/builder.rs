//! Context-window-bounded prompt assembly.

use crate::types::ConversationTurn;

use super::estimate::estimate_tokens;

/// Opening marker for a role section.
pub const TURN_START: &str = "<|im_start|>";

/// Closing marker for a role section.
pub const TURN_END: &str = "<|im_end|>";

/// Role header with no content, signalling the model where to continue.
pub const ASSISTANT_MARKER: &str = "<|im_start|>assistant\n";

/// Format one role-tagged section of the prompt.
///
/// `<|im_start|>` markup works across the Qwen/DeepSeek/LLaMA family and
/// lines up with the engine's stop-sequence set, so generation halts at
/// conversation boundaries.
pub fn format_turn(role: &str, content: &str) -> String {
    format!("{TURN_START}{role}\n{content}{TURN_END}\n")
}

/// An assembled prompt, produced fresh per request and never persisted.
#[derive(Debug, Clone)]
pub struct PromptAssembly {
    /// The full prompt text, ending with [`ASSISTANT_MARKER`].
    pub text: String,

    /// How many history turns survived trimming.
    pub included_turns: usize,

    /// Estimated token count of the full text.
    pub estimated_tokens: usize,
}

/// Assembles prompts under a token budget.
///
/// The system section and the new user message are always included; the
/// history in between is filled newest-first until the budget minus the
/// reserved reply margin runs out. Turns are included whole or not at
/// all — a partially quoted turn would be worse than a dropped one.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    budget: usize,
    reserved_margin: usize,
}

impl ContextWindow {
    /// Create a builder for the given context budget and reply margin.
    pub fn new(budget: usize, reserved_margin: usize) -> Self {
        Self {
            budget,
            reserved_margin,
        }
    }

    /// Assemble a prompt from `history` (oldest → newest), the system
    /// prompt, and the new user message.
    ///
    /// A degenerate budget (smaller than the always-included sections)
    /// still returns a valid prompt with no history — graceful
    /// degradation, not an error.
    pub fn build(
        &self,
        history: &[ConversationTurn],
        system_prompt: &str,
        user_prompt: &str,
    ) -> PromptAssembly {
        let system_section = format_turn("system", system_prompt);
        let user_section = format_turn("user", user_prompt.trim());

        let required = estimate_tokens(&system_section)
            + estimate_tokens(&user_section)
            + estimate_tokens(ASSISTANT_MARKER);
        let available = self
            .budget
            .saturating_sub(required)
            .saturating_sub(self.reserved_margin);

        // Walk newest → oldest, re-inserting at the front so the selected
        // slice stays in chronological order.
        let mut selected: Vec<String> = Vec::new();
        let mut used = 0usize;
        for turn in history.iter().rev() {
            let content = turn.content.trim();
            if content.is_empty() {
                continue;
            }
            let section = format_turn(turn.role.as_str(), content);
            let cost = estimate_tokens(&section);
            if used + cost > available {
                break;
            }
            selected.insert(0, section);
            used += cost;
        }

        let included_turns = selected.len();
        let mut text = system_section;
        for section in &selected {
            text.push_str(section);
        }
        text.push_str(&user_section);
        text.push_str(ASSISTANT_MARKER);

        let estimated_tokens = estimate_tokens(&text);
        PromptAssembly {
            text,
            included_turns,
            estimated_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationTurn;

    #[test]
    fn format_turn_markup() {
        let section = format_turn("user", "hi");
        assert_eq!(section, "<|im_start|>user\nhi<|im_end|>\n");
    }

    #[test]
    fn empty_history_still_has_system_and_user() {
        let window = ContextWindow::new(2048, 512);
        let assembly = window.build(&[], "Be terse.", "What is 2+2?");
        assert!(assembly.text.starts_with("<|im_start|>system\nBe terse."));
        assert!(assembly.text.contains("<|im_start|>user\nWhat is 2+2?"));
        assert!(assembly.text.ends_with(ASSISTANT_MARKER));
        assert_eq!(assembly.included_turns, 0);
    }

    #[test]
    fn zero_budget_preserves_system_and_user() {
        let window = ContextWindow::new(0, 512);
        let history = vec![ConversationTurn::user("earlier question")];
        let assembly = window.build(&history, "system text", "new question");
        assert!(assembly.text.contains("system text"));
        assert!(assembly.text.contains("new question"));
        assert_eq!(assembly.included_turns, 0);
    }
}
