//! Deciding when the retrieval engine must be rebuilt.
//!
//! [`InvalidationController`] remembers the document fingerprint and
//! retrieval parameters the current engine was built for. Each turn it is
//! handed the current ones and either reuses the engine, rebuilds it, or
//! reports that there is nothing to build from.
//!
//! | previous state  | documents | fingerprint/params  | result                   |
//! |-----------------|-----------|---------------------|--------------------------|
//! | any             | none      | –                   | engine dropped, no files |
//! | uninitialised   | present   | –                   | build                    |
//! | engine ready    | present   | either changed      | drop and rebuild         |
//! | engine ready    | present   | both unchanged      | reuse                    |
//!
//! There is no memory of older fingerprints: going back to a document set
//! seen two turns ago is a change like any other. A missing fingerprint
//! never counts as unchanged, so every turn without documents reports the
//! condition again. None of this touches the query cache.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::{ChatEngine, EngineFactory};
use crate::fingerprint::DocumentFingerprint;
use crate::types::RetrievalParams;
use crate::uploads::DocumentSet;
use crate::{Result, telemetry};

/// Whether an engine is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    EngineReady,
}

/// What [`InvalidationController::decide`] concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No documents: drop any engine and report it.
    NoDocuments,
    /// No engine yet: build one.
    Build,
    /// Fingerprint or parameters changed: drop the engine and build anew.
    Rebuild,
    /// Nothing changed.
    Reuse,
}

/// What [`InvalidationController::prepare`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NoDocuments,
    Built,
    Rebuilt,
    Reused,
}

impl Transition {
    /// Whether a new engine was built.
    pub fn built_engine(&self) -> bool {
        matches!(self, Transition::Built | Transition::Rebuilt)
    }
}

/// Tracks which document set and parameters the live engine belongs to.
#[derive(Default)]
pub struct InvalidationController {
    last_fingerprint: Option<DocumentFingerprint>,
    last_params: Option<RetrievalParams>,
    engine: Option<Arc<dyn ChatEngine>>,
    builds: u64,
}

impl InvalidationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        if self.engine.is_some() {
            ControllerState::EngineReady
        } else {
            ControllerState::Uninitialized
        }
    }

    /// The live engine, if any.
    pub fn engine(&self) -> Option<Arc<dyn ChatEngine>> {
        self.engine.clone()
    }

    /// Number of engines built so far.
    pub fn rebuild_count(&self) -> u64 {
        self.builds
    }

    pub fn last_fingerprint(&self) -> Option<&DocumentFingerprint> {
        self.last_fingerprint.as_ref()
    }

    pub fn last_params(&self) -> Option<&RetrievalParams> {
        self.last_params.as_ref()
    }

    /// Classify a turn without changing anything.
    pub fn decide(
        &self,
        fingerprint: Option<&DocumentFingerprint>,
        params: &RetrievalParams,
    ) -> Decision {
        let Some(fingerprint) = fingerprint else {
            return Decision::NoDocuments;
        };
        if self.engine.is_none() {
            return Decision::Build;
        }
        if self.last_fingerprint.as_ref() != Some(fingerprint)
            || self.last_params.as_ref() != Some(params)
        {
            Decision::Rebuild
        } else {
            Decision::Reuse
        }
    }

    /// Bring the engine in line with this turn's documents and parameters.
    ///
    /// On a build failure the controller is left without an engine and
    /// without tracked state, so the next turn tries again.
    pub async fn prepare(
        &mut self,
        fingerprint: Option<DocumentFingerprint>,
        documents: &DocumentSet,
        params: RetrievalParams,
        factory: &dyn EngineFactory,
    ) -> Result<Transition> {
        let decision = self.decide(fingerprint.as_ref(), &params);
        debug!(?decision, ?fingerprint, "invalidation decision");

        match decision {
            Decision::Reuse => return Ok(Transition::Reused),
            Decision::NoDocuments => {
                if self.engine.take().is_some() {
                    info!("documents removed, retrieval engine dropped");
                }
                self.last_fingerprint = None;
                self.last_params = Some(params);
                return Ok(Transition::NoDocuments);
            }
            Decision::Build | Decision::Rebuild => {}
        }

        // The old engine goes first, whatever happens to the new one.
        self.engine = None;
        self.last_fingerprint = None;
        self.last_params = None;

        let engine = match factory.retrieval(documents, params).await {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, "failed to build retrieval engine");
                return Err(e);
            }
        };

        self.engine = Some(engine);
        self.last_fingerprint = fingerprint;
        self.last_params = Some(params);
        self.builds += 1;
        metrics::counter!(telemetry::ENGINE_BUILDS_TOTAL, "mode" => "rag").increment(1);
        info!(
            documents = documents.len(),
            num_docs = params.num_docs(),
            similarity_threshold = params.similarity_threshold(),
            rebuild = decision == Decision::Rebuild,
            "retrieval engine ready"
        );

        Ok(if decision == Decision::Rebuild {
            Transition::Rebuilt
        } else {
            Transition::Built
        })
    }

    /// Drop the engine and forget the tracked state; the next turn with
    /// documents builds from scratch.
    pub fn invalidate(&mut self) {
        self.engine = None;
        self.last_fingerprint = None;
        self.last_params = None;
    }
}
