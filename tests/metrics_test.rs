//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use muninn::cache::Fingerprint;
use muninn::engine::{CompletionEngine, EngineInfo, FragmentStream};
use muninn::telemetry;
use muninn::{
    CacheConfig, GenerationOptions, InferenceOrchestrator, ResponseCache, Result,
};

// ============================================================================
// Mock engine
// ============================================================================

struct EchoEngine;

#[async_trait]
impl CompletionEngine for EchoEngine {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        Ok("four words of answer".to_string())
    }

    async fn stream(&self, _prompt: &str, _options: &GenerationOptions) -> Result<FragmentStream> {
        unimplemented!("blocking-only test engine")
    }

    fn info(&self) -> EngineInfo {
        unimplemented!()
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn fingerprint() -> Fingerprint {
    Fingerprint::new("u", "s", "Ping", &GenerationOptions::new())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_cache_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let orchestrator = InferenceOrchestrator::new(
                    Arc::new(EchoEngine),
                    Some(ResponseCache::new(&CacheConfig::default())),
                );
                let options = GenerationOptions::new();
                orchestrator
                    .complete(&fingerprint(), "<prompt>", &options)
                    .await
                    .unwrap();
                orchestrator
                    .complete(&fingerprint(), "<prompt>", &options)
                    .await
                    .unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_TOTAL), 4);
    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let orchestrator = InferenceOrchestrator::new(Arc::new(EchoEngine), None);
    let result = orchestrator
        .complete(&fingerprint(), "<prompt>", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(result.text, "four words of answer");
}
