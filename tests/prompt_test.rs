//! Tests for context-window-bounded prompt assembly.

use muninn::prompt::builder::{ASSISTANT_MARKER, format_turn};
use muninn::prompt::{ContextWindow, estimate_tokens};
use muninn::types::ConversationTurn;

fn history(pairs: &[(&str, &str)]) -> Vec<ConversationTurn> {
    let mut turns = Vec::new();
    for (user, assistant) in pairs {
        turns.push(ConversationTurn::user(*user));
        turns.push(ConversationTurn::assistant(*assistant));
    }
    turns
}

#[test]
fn small_history_is_included_in_order() {
    let window = ContextWindow::new(4096, 512);
    let turns = history(&[("Hi", "Hello!")]);
    let assembly = window.build(&turns, "You are a helpful AI assistant.", "What is 2+2?");

    let hi = assembly.text.find("<|im_start|>user\nHi<|im_end|>").unwrap();
    let hello = assembly
        .text
        .find("<|im_start|>assistant\nHello!<|im_end|>")
        .unwrap();
    let question = assembly.text.find("What is 2+2?").unwrap();
    assert!(hi < hello && hello < question);
    assert!(assembly.text.ends_with(ASSISTANT_MARKER));
    assert_eq!(assembly.included_turns, 2);
}

#[test]
fn system_and_user_survive_any_budget() {
    let turns = history(&[("a b c", "d e f"), ("g h i", "j k l")]);
    for budget in [0, 1, 10, 100, 10_000] {
        let assembly =
            ContextWindow::new(budget, 512).build(&turns, "system directive", "the question");
        assert!(
            assembly.text.contains("system directive"),
            "system section missing at budget {budget}"
        );
        assert!(
            assembly.text.contains("the question"),
            "user section missing at budget {budget}"
        );
        assert!(assembly.text.ends_with(ASSISTANT_MARKER));
    }
}

#[test]
fn newest_turns_win_under_pressure() {
    // Each turn costs the same; pick a budget that admits only some.
    let turns = history(&[
        ("oldest question", "oldest answer"),
        ("middle question", "middle answer"),
        ("newest question", "newest answer"),
    ]);
    let system = "sys";
    let user = "next";

    let everything = ContextWindow::new(10_000, 0).build(&turns, system, user);
    assert_eq!(everything.included_turns, 6);

    // Budget sized so the oldest turns fall off first.
    let required = estimate_tokens(&format_turn("system", system))
        + estimate_tokens(&format_turn("user", user))
        + estimate_tokens(ASSISTANT_MARKER);
    let one_turn = estimate_tokens(&format_turn("user", "newest question"));
    let squeezed = ContextWindow::new(required + one_turn * 3, 0).build(&turns, system, user);

    assert!(squeezed.included_turns < 6);
    assert!(squeezed.text.contains("newest answer"));
    assert!(!squeezed.text.contains("oldest question"));
}

#[test]
fn trimming_is_all_or_nothing_per_turn() {
    let mut turns = history(&[("short", "short reply")]);
    turns.insert(0, ConversationTurn::user("very long turn ".repeat(200)));

    let assembly = ContextWindow::new(128, 0).build(&turns, "sys", "next");
    // The oversized turn is dropped whole, never partially quoted.
    assert!(!assembly.text.contains("very long turn"));
    assert!(assembly.text.contains("short reply"));
}

#[test]
fn blank_turns_are_skipped_entirely() {
    let turns = vec![
        ConversationTurn::user("   \n\t  "),
        ConversationTurn::assistant("real content"),
    ];
    let assembly = ContextWindow::new(4096, 512).build(&turns, "sys", "next");
    assert_eq!(assembly.included_turns, 1);
    assert!(assembly.text.contains("real content"));
}

#[test]
fn budget_invariant_holds() {
    // The assembled estimate never exceeds budget - margin by more than
    // one turn's worth (trimming is per-turn, not per-token).
    let turns = history(&[
        ("one two three four five", "six seven eight nine ten"),
        ("alpha beta gamma", "delta epsilon zeta"),
        ("red green blue", "cyan magenta yellow"),
    ]);
    let budget = 60;
    let margin = 10;
    let assembly = ContextWindow::new(budget, margin).build(&turns, "sys", "next question");

    let largest_turn = turns
        .iter()
        .map(|t| estimate_tokens(&format_turn(t.role.as_str(), &t.content)))
        .max()
        .unwrap();
    assert!(assembly.estimated_tokens <= budget - margin + largest_turn);
}

#[test]
fn user_prompt_is_trimmed() {
    let assembly = ContextWindow::new(2048, 512).build(&[], "sys", "  padded question  ");
    assert!(assembly.text.contains("<|im_start|>user\npadded question<|im_end|>"));
}
