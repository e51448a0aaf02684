//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use mimir::telemetry;
use mimir::{
    CacheConfig, ChatEngine, ChatSession, DocumentSet, EngineFactory, EngineResponse, Message,
    MimirError, Mode, Result, RetrievalParams, Upload,
};

// ============================================================================
// Mock engines
// ============================================================================

struct EchoEngine {
    mode: Mode,
    fail: bool,
}

#[async_trait]
impl ChatEngine for EchoEngine {
    fn mode(&self) -> Mode {
        self.mode
    }

    async fn generate(&self, prompt: &str, _history: &[Message]) -> Result<EngineResponse> {
        if self.fail {
            return Err(MimirError::Llm("backend down".into()));
        }
        Ok(EngineResponse::complete(format!("echo: {prompt}")))
    }
}

struct EchoFactory {
    fail: bool,
}

#[async_trait]
impl EngineFactory for EchoFactory {
    async fn retrieval(
        &self,
        _documents: &DocumentSet,
        _params: RetrievalParams,
    ) -> Result<Arc<dyn ChatEngine>> {
        Ok(Arc::new(EchoEngine {
            mode: Mode::Rag,
            fail: self.fail,
        }))
    }

    async fn plain(&self) -> Result<Arc<dyn ChatEngine>> {
        Ok(Arc::new(EchoEngine {
            mode: Mode::Plain,
            fail: self.fail,
        }))
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

// ============================================================================
// Helpers
// ============================================================================

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

/// Sum counter values for a metric name carrying a given label value.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
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

/// Run three RAG turns: a miss, a hit and a turn without documents.
async fn three_turns(fail: bool) {
    let mut session = ChatSession::new(Arc::new(EchoFactory { fail }), &CacheConfig::default());
    let mut docs = DocumentSet::new(vec![Upload::new("doc.txt", "content")]);
    let params = RetrievalParams::default();

    session.turn(Mode::Rag, "q", &mut docs, params, |_| {}).await;
    session.turn(Mode::Rag, "q", &mut docs, params, |_| {}).await;
    session
        .turn(Mode::Rag, "q", &mut DocumentSet::default(), params, |_| {})
        .await;
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn turns_record_cache_and_duration_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(three_turns(false))
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::ENGINE_BUILDS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::TURNS_TOTAL), 3);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TURNS_TOTAL, "status", "cached"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TURNS_TOTAL, "status", "no_documents"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::RESPONSE_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_generation_records_error_status() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(three_turns(true))
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    // Failures are not cached, so the second turn misses too.
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 0);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TURNS_TOTAL, "status", "error"),
        2
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    three_turns(false).await;
}
