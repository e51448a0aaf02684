//! Generation engines and the seams they are built from.
//!
//! The session only ever talks to a [`ChatEngine`]: give it a prompt and
//! the conversation so far, get back a complete answer or a token stream.
//! Engines are assembled by an [`EngineFactory`] and thrown away whenever
//! the invalidation controller says the document set or retrieval
//! parameters changed.
//!
//! Concrete engines sit on two narrower capabilities:
//!
//! - [`ChatModel`]: chat completion, streaming or not.
//! - [`Embedder`]: text embeddings for the retrieval index.
//!
//! [`LlmBackend`] implements both on top of the `llm` crate (Ollama by
//! default). Tests plug in their own.
//!
//! # Engines
//!
//! - [`RetrievalEngine`]: indexes the uploaded documents, retrieves the
//!   best chunks for each prompt and streams an answer grounded in them.
//! - [`PlainEngine`]: answers without retrieval, using earlier assistant
//!   replies as context.

pub mod backend;
pub mod backpressure;
pub mod index;
pub mod plain;
pub mod rag;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::cache::EmbeddingCache;
use crate::types::{EngineResponse, EventStream, Message, Mode, RetrievalParams};
use crate::uploads::DocumentSet;

pub use backend::{LlmBackend, LlmSettings};
pub use backpressure::{DEFAULT_STREAM_BUFFER, bounded_stream};
pub use index::{ChunkConfig, ScoredChunk, VectorIndex};
pub use plain::PlainEngine;
pub use rag::RetrievalEngine;

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a chatbot, able to have normal interactions.";

/// Default history budget in (estimated) tokens.
pub const DEFAULT_MEMORY_TOKEN_LIMIT: usize = 4000;

/// Something that answers prompts.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Which mode this engine serves.
    fn mode(&self) -> Mode;

    /// Answer `prompt` given the conversation so far (oldest first, not
    /// including `prompt`).
    async fn generate(&self, prompt: &str, history: &[Message]) -> Result<EngineResponse>;
}

/// Chat completion capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Name for logging/debugging.
    fn name(&self) -> &str;

    /// Non-streaming completion.
    async fn chat(&self, system: Option<&str>, messages: &[Message]) -> Result<String>;

    /// Streaming completion.
    async fn chat_stream(&self, system: Option<&str>, messages: &[Message])
    -> Result<EventStream>;
}

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding model identifier, part of the embedding cache key.
    fn model(&self) -> &str;

    /// Embed each text; returns one vector per input, in order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Builds engines on demand.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Index `documents` and build a retrieval engine for `params`.
    async fn retrieval(
        &self,
        documents: &DocumentSet,
        params: RetrievalParams,
    ) -> Result<Arc<dyn ChatEngine>>;

    /// Build an engine that answers without retrieval.
    async fn plain(&self) -> Result<Arc<dyn ChatEngine>>;
}

/// Settings shared by the engines a [`ModelEngineFactory`] builds.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub system_prompt: String,
    /// History budget in estimated tokens.
    pub memory_token_limit: usize,
    pub chunking: ChunkConfig,
    /// Token stream buffer between engine and consumer.
    pub stream_buffer: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            memory_token_limit: DEFAULT_MEMORY_TOKEN_LIMIT,
            chunking: ChunkConfig::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

/// [`EngineFactory`] over a chat model and an embedder.
pub struct ModelEngineFactory {
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    embeddings: EmbeddingCache,
    settings: EngineSettings,
}

impl ModelEngineFactory {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        embeddings: EmbeddingCache,
        settings: EngineSettings,
    ) -> Self {
        Self {
            chat,
            embedder,
            embeddings,
            settings,
        }
    }

    /// Factory whose chat model and embedder are the same [`LlmBackend`].
    pub fn from_backend(
        backend: LlmBackend,
        embeddings: EmbeddingCache,
        settings: EngineSettings,
    ) -> Self {
        let backend = Arc::new(backend);
        Self::new(backend.clone(), backend, embeddings, settings)
    }
}

#[async_trait]
impl EngineFactory for ModelEngineFactory {
    async fn retrieval(
        &self,
        documents: &DocumentSet,
        params: RetrievalParams,
    ) -> Result<Arc<dyn ChatEngine>> {
        let index = VectorIndex::build(
            documents,
            self.embedder.as_ref(),
            &self.embeddings,
            &self.settings.chunking,
        )
        .await?;
        Ok(Arc::new(RetrievalEngine::new(
            index,
            params,
            self.chat.clone(),
            self.embedder.clone(),
            self.settings.clone(),
        )))
    }

    async fn plain(&self) -> Result<Arc<dyn ChatEngine>> {
        Ok(Arc::new(PlainEngine::new(
            self.chat.clone(),
            self.settings.memory_token_limit,
        )))
    }
}
