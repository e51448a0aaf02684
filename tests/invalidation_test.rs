//! Tests for [`InvalidationController`]: engine rebuild decisions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mimir::{
    ChatEngine, ControllerState, DocumentSet, EngineFactory, EngineResponse,
    InvalidationController, Message, MimirError, Mode, Result, RetrievalParams, Transition,
    Upload,
};

// ============================================================================
// Mocks
// ============================================================================

struct StubEngine;

#[async_trait]
impl ChatEngine for StubEngine {
    fn mode(&self) -> Mode {
        Mode::Rag
    }

    async fn generate(&self, _prompt: &str, _history: &[Message]) -> Result<EngineResponse> {
        Ok(EngineResponse::complete("stub"))
    }
}

/// Counts retrieval engine builds; fails while `fail` is set.
#[derive(Default)]
struct CountingFactory {
    builds: AtomicUsize,
    fail: std::sync::atomic::AtomicBool,
}

impl CountingFactory {
    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for CountingFactory {
    async fn retrieval(
        &self,
        _documents: &DocumentSet,
        _params: RetrievalParams,
    ) -> Result<Arc<dyn ChatEngine>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MimirError::Llm("embedding backend unreachable".into()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubEngine))
    }

    async fn plain(&self) -> Result<Arc<dyn ChatEngine>> {
        Ok(Arc::new(StubEngine))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn docs(content: &str) -> DocumentSet {
    DocumentSet::new(vec![Upload::new("doc.txt", content)])
}

async fn step(
    controller: &mut InvalidationController,
    factory: &CountingFactory,
    documents: &mut DocumentSet,
    params: RetrievalParams,
) -> Transition {
    let fp = documents.fingerprint().unwrap();
    controller
        .prepare(fp, documents, params, factory)
        .await
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn first_turn_with_documents_builds() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();

    let t = step(&mut controller, &factory, &mut docs("f1"), params).await;
    assert_eq!(t, Transition::Built);
    assert_eq!(controller.state(), ControllerState::EngineReady);
    assert_eq!(factory.builds(), 1);
    assert_eq!(controller.last_params(), Some(&params));
}

#[tokio::test]
async fn unchanged_inputs_reuse_engine() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();
    let mut f1 = docs("f1");

    step(&mut controller, &factory, &mut f1, params).await;
    let before = controller.engine().unwrap();
    let t = step(&mut controller, &factory, &mut f1, params).await;

    assert_eq!(t, Transition::Reused);
    assert!(!t.built_engine());
    assert_eq!(factory.builds(), 1);
    assert!(Arc::ptr_eq(&before, &controller.engine().unwrap()));
}

#[tokio::test]
async fn returning_to_earlier_documents_rebuilds() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();

    step(&mut controller, &factory, &mut docs("f1"), params).await;
    let t = step(&mut controller, &factory, &mut docs("f2"), params).await;
    assert_eq!(t, Transition::Rebuilt);
    assert!(t.built_engine());
    assert_eq!(factory.builds(), 2);

    let t = step(&mut controller, &factory, &mut docs("f1"), params).await;
    assert_eq!(t, Transition::Rebuilt);
    assert_eq!(factory.builds(), 3);
    assert_eq!(controller.rebuild_count(), 3);
}

#[tokio::test]
async fn parameter_change_rebuilds() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let mut f1 = docs("f1");

    step(&mut controller, &factory, &mut f1, RetrievalParams::default()).await;
    let narrower = RetrievalParams::new(2, 0.9).unwrap();
    let t = step(&mut controller, &factory, &mut f1, narrower).await;

    assert_eq!(t, Transition::Rebuilt);
    assert_eq!(factory.builds(), 2);
}

#[tokio::test]
async fn missing_documents_drop_the_engine_every_turn() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();
    let mut empty = DocumentSet::default();

    step(&mut controller, &factory, &mut docs("f1"), params).await;

    for _ in 0..2 {
        let t = step(&mut controller, &factory, &mut empty, params).await;
        assert_eq!(t, Transition::NoDocuments);
        assert!(!t.built_engine());
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert!(controller.engine().is_none());
    }

    // Uploading again builds from scratch.
    let t = step(&mut controller, &factory, &mut docs("f1"), params).await;
    assert_eq!(t, Transition::Built);
    assert_eq!(factory.builds(), 2);
}

#[tokio::test]
async fn build_failure_leaves_controller_uninitialized() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();
    let mut f1 = docs("f1");

    step(&mut controller, &factory, &mut f1, params).await;
    factory.fail.store(true, Ordering::SeqCst);

    let fp = f1.fingerprint().unwrap();
    let err = controller
        .prepare(fp, &f1, RetrievalParams::new(1, 0.1).unwrap(), &factory)
        .await;
    assert!(err.is_err());
    assert_eq!(controller.state(), ControllerState::Uninitialized);
    assert!(controller.last_fingerprint().is_none());

    // Next turn retries.
    factory.fail.store(false, Ordering::SeqCst);
    let t = step(&mut controller, &factory, &mut f1, params).await;
    assert_eq!(t, Transition::Built);
}

#[tokio::test]
async fn invalidate_forces_a_fresh_build() {
    let factory = CountingFactory::default();
    let mut controller = InvalidationController::new();
    let params = RetrievalParams::default();
    let mut f1 = docs("f1");

    step(&mut controller, &factory, &mut f1, params).await;
    controller.invalidate();
    assert_eq!(controller.state(), ControllerState::Uninitialized);

    let t = step(&mut controller, &factory, &mut f1, params).await;
    assert_eq!(t, Transition::Built);
    assert_eq!(factory.builds(), 2);
}
