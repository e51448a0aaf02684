//! Mimir - document-grounded chat with a per-session answer cache
//!
//! This crate answers chat prompts either from a local model alone (plain
//! mode) or grounded in uploaded documents (RAG mode). Each
//! [`ChatSession`] keeps a small FIFO cache of completed answers keyed by
//! the prompt and the retrieval parameters in effect, and rebuilds its
//! retrieval engine only when the uploaded documents or those parameters
//! change.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mimir::{
//!     CacheConfig, ChatSession, DocumentSet, EmbeddingCache, EngineSettings, LlmBackend,
//!     LlmSettings, Mode, ModelEngineFactory, RetrievalParams, TurnOutcome, Upload,
//! };
//!
//! #[tokio::main]
//! async fn main() -> mimir::Result<()> {
//!     let backend = LlmBackend::new(LlmSettings::default())?;
//!     let factory = ModelEngineFactory::from_backend(
//!         backend,
//!         EmbeddingCache::default(),
//!         EngineSettings::default(),
//!     );
//!     let mut session = ChatSession::new(Arc::new(factory), &CacheConfig::default());
//!
//!     let mut docs = DocumentSet::new(vec![Upload::new("notes.txt", "Mimir guards the well.")]);
//!     let outcome = session
//!         .turn(
//!             Mode::Rag,
//!             "Who guards the well?",
//!             &mut docs,
//!             RetrievalParams::default(),
//!             |token| print!("{token}"),
//!         )
//!         .await;
//!
//!     if let TurnOutcome::Answered(answer) = outcome
//!         && let Some(sources) = answer.completion.sources
//!     {
//!         println!("\n\n{sources}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod fingerprint;
pub mod invalidation;
pub mod pipeline;
pub mod session;
pub mod telemetry;
pub mod types;
pub mod uploads;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CachedResponse, EmbeddingCache, EmbeddingCacheConfig, QueryCache};
pub use config::Config;
pub use engine::backend::BackendKind;
pub use engine::{
    ChatEngine, ChatModel, Embedder, EngineFactory, EngineSettings, LlmBackend, LlmSettings,
    ModelEngineFactory, PlainEngine, RetrievalEngine,
};
pub use error::{MimirError, Result};
pub use feedback::{FeedbackData, FeedbackRecord, FeedbackStore};
pub use fingerprint::{DocumentFingerprint, fingerprint, fingerprint_bytes};
pub use invalidation::{ControllerState, Decision, InvalidationController, Transition};
pub use session::{Answer, ChatSession, Prepared, TurnOutcome};
pub use uploads::{DocumentSet, Upload, UploadStore};
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    Completion, CompletionKind, EngineResponse, EventStream, GREETING, GenerationEvent, Message,
    Mode, RetrievalParams, Role, SourceReference,
};
