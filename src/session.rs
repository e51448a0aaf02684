//! One user's conversation.
//!
//! A [`ChatSession`] owns everything that outlives a single turn: the
//! per-mode query caches, the invalidation controller, the plain-mode
//! engine slot and the chat history. Nothing here is global, so a process
//! can host as many sessions as it likes. Turns take `&mut self` and run
//! to completion before the next one starts.
//!
//! A turn goes through these steps:
//!
//! 1. Make sure an engine for the mode exists. In RAG mode this means
//!    fingerprinting the documents and letting the
//!    [`InvalidationController`] reuse, rebuild or give up. A turn without
//!    documents ends here as [`TurnOutcome::NoDocuments`].
//! 2. Probe the mode's cache with the prompt and parameters. A hit is
//!    answered without touching the engine.
//! 3. Otherwise generate, fold the token stream into a [`Completion`] and
//!    cache it if it succeeded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheConfig, CachedResponse, QueryCache};
use crate::engine::{ChatEngine, EngineFactory};
use crate::feedback::{FeedbackRecord, FeedbackStore};
use crate::fingerprint::DocumentFingerprint;
use crate::invalidation::InvalidationController;
use crate::types::{Completion, CompletionKind, GREETING, Message, Mode, RetrievalParams};
use crate::uploads::{DocumentSet, UploadStore};
use crate::{MimirError, Result, pipeline, telemetry};

/// Engine ready for a turn, plus anything worth telling the user.
pub struct Prepared {
    /// `None` when RAG mode has no documents to work from.
    pub engine: Option<Arc<dyn ChatEngine>>,
    /// Non-fatal problems, e.g. uploads that could not be persisted.
    pub warnings: Vec<String>,
}

/// An answered turn.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Id under which feedback for this answer is stored.
    pub response_id: String,
    pub mode: Mode,
    pub completion: Completion,
    /// Served from the query cache.
    pub cached: bool,
    pub elapsed: Duration,
    pub warnings: Vec<String>,
}

/// Result of [`ChatSession::turn`].
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Answered(Answer),
    /// RAG mode without uploaded files. Nothing was generated or cached.
    NoDocuments,
}

impl TurnOutcome {
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            TurnOutcome::Answered(answer) => Some(answer),
            TurnOutcome::NoDocuments => None,
        }
    }
}

/// What feedback would refer to.
#[derive(Debug, Clone)]
struct LastAnswer {
    response_id: String,
    mode: Mode,
    params: RetrievalParams,
}

/// State of one conversation.
pub struct ChatSession {
    id: String,
    factory: Arc<dyn EngineFactory>,
    rag_cache: QueryCache,
    plain_cache: QueryCache,
    controller: InvalidationController,
    plain_engine: Option<Arc<dyn ChatEngine>>,
    history: Vec<Message>,
    uploads: Option<UploadStore>,
    stored: Option<DocumentFingerprint>,
    last_answer: Option<LastAnswer>,
}

impl ChatSession {
    /// Start a conversation. The history opens with the assistant greeting.
    pub fn new(factory: Arc<dyn EngineFactory>, cache: &CacheConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            factory,
            rag_cache: QueryCache::new(cache, Mode::Rag),
            plain_cache: QueryCache::new(cache, Mode::Plain),
            controller: InvalidationController::new(),
            plain_engine: None,
            history: vec![Message::assistant(GREETING)],
            uploads: None,
            stored: None,
            last_answer: None,
        }
    }

    /// Persist each new document batch under `store`.
    pub fn with_upload_store(mut self, store: UploadStore) -> Self {
        self.uploads = Some(store);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Conversation so far, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn cache(&self, mode: Mode) -> &QueryCache {
        match mode {
            Mode::Rag => &self.rag_cache,
            Mode::Plain => &self.plain_cache,
        }
    }

    fn cache_mut(&mut self, mode: Mode) -> &mut QueryCache {
        match mode {
            Mode::Rag => &mut self.rag_cache,
            Mode::Plain => &mut self.plain_cache,
        }
    }

    pub fn controller(&self) -> &InvalidationController {
        &self.controller
    }

    /// Cached answer for `prompt` under `params`, if any.
    pub fn probe_cache(
        &self,
        mode: Mode,
        prompt: &str,
        params: &RetrievalParams,
    ) -> Option<CachedResponse> {
        self.cache(mode).get(prompt, params)
    }

    /// Cache a finished answer. Failures are not cached; returns whether
    /// the completion was stored.
    pub fn record_completion(
        &mut self,
        mode: Mode,
        prompt: &str,
        params: RetrievalParams,
        completion: &Completion,
    ) -> bool {
        if !completion.is_success() {
            debug!(%mode, "not caching failed generation");
            return false;
        }
        self.cache_mut(mode).put(
            prompt,
            params,
            completion.response.clone(),
            completion.sources.clone(),
        );
        true
    }

    /// Get the engine for `mode` ready.
    ///
    /// Leaving plain mode drops the plain engine; entering it builds one.
    /// In RAG mode the document batch is fingerprinted, persisted when new,
    /// and handed to the invalidation controller.
    pub async fn prepare(
        &mut self,
        mode: Mode,
        documents: &mut DocumentSet,
        params: RetrievalParams,
    ) -> Result<Prepared> {
        let mut warnings = Vec::new();
        let engine = self
            .prepare_engine(mode, documents, params, &mut warnings)
            .await?;
        Ok(Prepared { engine, warnings })
    }

    /// Warnings are pushed as they happen, so they survive a failed build.
    async fn prepare_engine(
        &mut self,
        mode: Mode,
        documents: &mut DocumentSet,
        params: RetrievalParams,
        warnings: &mut Vec<String>,
    ) -> Result<Option<Arc<dyn ChatEngine>>> {
        match mode {
            Mode::Plain => {
                if let Some(engine) = &self.plain_engine {
                    return Ok(Some(engine.clone()));
                }
                let engine = self.factory.plain().await?;
                metrics::counter!(telemetry::ENGINE_BUILDS_TOTAL, "mode" => "plain").increment(1);
                debug!(session = %self.id, "plain engine built");
                self.plain_engine = Some(engine.clone());
                Ok(Some(engine))
            }
            Mode::Rag => {
                if self.plain_engine.take().is_some() {
                    debug!(session = %self.id, "plain engine dropped");
                }

                let fingerprint = documents.fingerprint()?;
                if let Some(warning) = self.persist_uploads(fingerprint.as_ref(), documents) {
                    warnings.push(warning);
                }

                self.controller
                    .prepare(fingerprint, documents, params, self.factory.as_ref())
                    .await?;
                Ok(self.controller.engine())
            }
        }
    }

    /// Store a batch the first time its fingerprint shows up. Returns a
    /// warning on failure.
    fn persist_uploads(
        &mut self,
        fingerprint: Option<&DocumentFingerprint>,
        documents: &mut DocumentSet,
    ) -> Option<String> {
        let store = self.uploads.as_ref()?;
        let fingerprint = fingerprint?;
        if self.stored.as_ref() == Some(fingerprint) {
            return None;
        }
        match store.store(documents) {
            Ok(_) => {
                self.stored = Some(*fingerprint);
                None
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "failed to persist uploads");
                Some(format!("Uploaded files could not be saved: {e}"))
            }
        }
    }

    /// Answer one prompt.
    ///
    /// `on_token` sees the answer as it is produced (a cached or failed
    /// answer arrives in one piece). Errors never escape: they come back
    /// as a failed [`Completion`] inside the answer.
    #[instrument(name = "session.turn", skip(self, prompt, documents, params, on_token), fields(session = %self.id, mode = %mode))]
    pub async fn turn<F>(
        &mut self,
        mode: Mode,
        prompt: &str,
        documents: &mut DocumentSet,
        params: RetrievalParams,
        mut on_token: F,
    ) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let start = Instant::now();

        let mut warnings = Vec::new();
        let prepared = self
            .prepare_engine(mode, documents, params, &mut warnings)
            .await;
        let (completion, cached) = match prepared {
            Ok(None) => {
                info!("no uploaded files");
                metrics::counter!(telemetry::TURNS_TOTAL, "mode" => mode.as_str(), "status" => "no_documents")
                    .increment(1);
                return TurnOutcome::NoDocuments;
            }
            Ok(Some(engine)) => {
                debug_assert_eq!(engine.mode(), mode, "engine serves the wrong mode");
                match self.probe_cache(mode, prompt, &params) {
                    Some(hit) => {
                        on_token(&hit.response);
                        let completion = Completion {
                            kind: CompletionKind::Success,
                            response: hit.response,
                            sources: hit.sources,
                        };
                        (completion, true)
                    }
                    None => {
                        let response = engine.generate(prompt, &self.history).await;
                        let completion = pipeline::complete(response, on_token).await;
                        self.record_completion(mode, prompt, params, &completion);
                        (completion, false)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "engine unavailable");
                let completion = Completion::failure(&e);
                on_token(&completion.response);
                (completion, false)
            }
        };

        let elapsed = start.elapsed();
        let status = if cached {
            "cached"
        } else if completion.is_success() {
            "ok"
        } else {
            "error"
        };
        metrics::counter!(telemetry::TURNS_TOTAL, "mode" => mode.as_str(), "status" => status)
            .increment(1);
        metrics::histogram!(telemetry::RESPONSE_DURATION_SECONDS, "mode" => mode.as_str(), "status" => status)
            .record(elapsed.as_secs_f64());
        info!(status, elapsed_ms = elapsed.as_millis() as u64, "turn complete");

        self.history.push(Message::user(prompt));
        self.history
            .push(Message::assistant(completion.response.clone()));

        let response_id = Uuid::new_v4().to_string();
        self.last_answer = Some(LastAnswer {
            response_id: response_id.clone(),
            mode,
            params,
        });

        TurnOutcome::Answered(Answer {
            response_id,
            mode,
            completion,
            cached,
            elapsed,
            warnings,
        })
    }

    /// Rate the most recent answer. Returns the response id the feedback
    /// was stored under.
    pub fn feedback(
        &self,
        store: &FeedbackStore,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<String> {
        let last = self
            .last_answer
            .as_ref()
            .ok_or_else(|| MimirError::InvalidInput("no answer to rate yet".to_string()))?;
        let params = (last.mode == Mode::Rag).then_some(last.params);
        store.record(&last.response_id, FeedbackRecord::new(rating, comment, params)?)?;
        Ok(last.response_id.clone())
    }

    /// Drop all engines; the next turn builds fresh ones. Caches and
    /// history are kept.
    pub fn reset(&mut self) {
        self.controller.invalidate();
        self.plain_engine = None;
        info!(session = %self.id, "engines reset");
    }

    /// Forget the conversation; only the greeting remains. Caches and
    /// engines are kept, and so is the last answer for feedback.
    pub fn clear_history(&mut self) {
        self.history = vec![Message::assistant(GREETING)];
        info!(session = %self.id, "history cleared");
    }

    /// Start over: clear the history and drop all engines.
    pub fn new_conversation(&mut self) {
        self.clear_history();
        self.reset();
    }
}
