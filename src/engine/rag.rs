//! Retrieval-augmented engine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{ChatEngine, ChatModel, Embedder, EngineSettings, VectorIndex, bounded_stream};
use crate::types::{EngineResponse, Message, Mode, RetrievalParams, SourceReference, trim_history};
use crate::{MimirError, Result};

/// Answers from the chunks of the uploaded documents that best match the
/// prompt.
///
/// Built once per (document set, parameters) pair; the invalidation
/// controller discards it when either changes.
pub struct RetrievalEngine {
    index: VectorIndex,
    params: RetrievalParams,
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    settings: EngineSettings,
}

impl RetrievalEngine {
    pub fn new(
        index: VectorIndex,
        params: RetrievalParams,
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            index,
            params,
            chat,
            embedder,
            settings,
        }
    }

    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Chunks to ground an answer to `prompt` in.
    pub async fn retrieve(&self, prompt: &str) -> Result<Vec<SourceReference>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed(&[prompt])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MimirError::Stream("embedder returned no query vector".to_string()))?;

        Ok(self
            .index
            .search(
                &query,
                self.params.num_docs() as usize,
                self.params.similarity_threshold(),
            )
            .iter()
            .map(|hit| hit.to_source())
            .collect())
    }

    fn system_prompt(&self, sources: &[SourceReference]) -> String {
        let context = sources
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "{}\nHere are the relevant documents for the context:\n\n{context}\n\n\
             Instruction: Use the previous chat history, or the context above, \
             to interact and help the user.",
            self.settings.system_prompt
        )
    }
}

#[async_trait]
impl ChatEngine for RetrievalEngine {
    fn mode(&self) -> Mode {
        Mode::Rag
    }

    #[instrument(name = "engine.rag", skip(self, prompt, history), fields(model = %self.chat.name(), num_docs = self.params.num_docs()))]
    async fn generate(&self, prompt: &str, history: &[Message]) -> Result<EngineResponse> {
        let sources = self.retrieve(prompt).await?;
        let system = self.system_prompt(&sources);

        let mut messages = trim_history(history, self.settings.memory_token_limit).to_vec();
        messages.push(Message::user(prompt));

        let events = self.chat.chat_stream(Some(system.as_str()), &messages).await?;
        Ok(EngineResponse::Stream {
            events: bounded_stream(events, self.settings.stream_buffer),
            sources,
        })
    }
}
