//! Tests for streaming sanitization.
//!
//! Whole-response cleaning is covered by the unit tests in
//! `engine::sanitize`; these exercise the stream wrapper: first-fragment
//! cleaning, bare-marker suppression, and error passthrough.

use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use muninn::engine::FragmentStream;
use muninn::{MuninnError, Result, Sanitizer};

fn scripted(items: Vec<Result<String>>) -> FragmentStream {
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        for item in items {
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    Box::pin(ReceiverStream::new(rx))
}

fn ok(fragments: &[&str]) -> Vec<Result<String>> {
    fragments.iter().map(|f| Ok(f.to_string())).collect()
}

async fn collect_ok(stream: FragmentStream) -> Vec<String> {
    stream.map(|item| item.unwrap()).collect().await
}

#[tokio::test]
async fn passthrough_for_clean_fragments() {
    let sanitizer = Sanitizer::new();
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&["Hello", " world"])))).await;
    assert_eq!(out, vec!["Hello", " world"]);
}

#[tokio::test]
async fn bare_marker_fragments_are_suppressed() {
    let sanitizer = Sanitizer::new();
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&[
        "<think>", "Paris", " is", " the", " answer", "</think>",
    ]))))
    .await;
    assert_eq!(out, vec!["Paris", " is", " the", " answer"]);
}

#[tokio::test]
async fn first_fragment_is_cleaned() {
    let sanitizer = Sanitizer::new();
    // The model opened with an inline reasoning span inside one fragment.
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&[
        "<think>hmm</think>Answer: 4",
        " exactly",
    ]))))
    .await;
    assert_eq!(out, vec!["Answer: 4", " exactly"]);
}

#[tokio::test]
async fn fully_stripped_first_fragment_is_dropped() {
    let sanitizer = Sanitizer::new();
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&[
        "<think>only reasoning</think>",
        "Real answer",
    ]))))
    .await;
    assert_eq!(out, vec!["Real answer"]);
}

#[tokio::test]
async fn later_fragments_pass_verbatim() {
    let sanitizer = Sanitizer::new();
    // "Let me" lines are filtered in whole-response mode, but verbatim
    // passthrough applies after the first fragment.
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&["Sure.", " Let me know"])))).await;
    assert_eq!(out, vec!["Sure.", " Let me know"]);
}

#[tokio::test]
async fn empty_fragments_are_dropped() {
    let sanitizer = Sanitizer::new();
    let out = collect_ok(sanitizer.clean_stream(scripted(ok(&["", "Hi", ""])))).await;
    assert_eq!(out, vec!["Hi"]);
}

#[tokio::test]
async fn errors_pass_through() {
    let sanitizer = Sanitizer::new();
    let mut items = ok(&["before "]);
    items.push(Err(MuninnError::Stream("boom".into())));

    let collected: Vec<Result<String>> = sanitizer.clean_stream(scripted(items)).collect().await;
    assert_eq!(collected.len(), 2);
    assert!(collected[0].is_ok());
    assert!(collected[1].is_err());
}
