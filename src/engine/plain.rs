//! Engine without retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{ChatEngine, ChatModel};
use crate::Result;
use crate::types::{EngineResponse, Message, Mode, Role, trim_history};

/// Sends the prompt to the chat model, prefixed with the assistant's
/// earlier replies so follow-up questions have something to refer to.
pub struct PlainEngine {
    chat: Arc<dyn ChatModel>,
    memory_token_limit: usize,
}

impl PlainEngine {
    pub fn new(chat: Arc<dyn ChatModel>, memory_token_limit: usize) -> Self {
        Self {
            chat,
            memory_token_limit,
        }
    }

    /// Prompt actually sent to the model.
    pub fn full_prompt(&self, prompt: &str, history: &[Message]) -> String {
        let context = trim_history(history, self.memory_token_limit)
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if context.is_empty() {
            prompt.to_string()
        } else {
            format!("{context}\n{prompt}")
        }
    }
}

#[async_trait]
impl ChatEngine for PlainEngine {
    fn mode(&self) -> Mode {
        Mode::Plain
    }

    #[instrument(name = "engine.plain", skip(self, prompt, history), fields(model = %self.chat.name()))]
    async fn generate(&self, prompt: &str, history: &[Message]) -> Result<EngineResponse> {
        let full_prompt = self.full_prompt(prompt, history);
        let text = self.chat.chat(None, &[Message::user(full_prompt)]).await?;
        Ok(EngineResponse::complete(text))
    }
}
