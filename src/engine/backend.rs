//! `llm` crate wrapper implementing [`ChatModel`] and [`Embedder`].
//!
//! [`LlmBackend`] stores configuration and builds an llm provider per
//! request, the way the llm crate expects system prompt and model to be
//! fixed at build time. Ollama is the default runtime; hosted backends are
//! selected with [`BackendKind`] and read their API key from the
//! environment.

use async_trait::async_trait;
use futures_util::{StreamExt, future};
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage as LlmMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use super::{ChatModel, Embedder};
use crate::types::{EventStream, GenerationEvent, Message, Role};
use crate::{MimirError, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Which runtime serves the models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
    OpenRouter,
    Google,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAI => "openai",
            BackendKind::Anthropic => "anthropic",
            BackendKind::OpenRouter => "openrouter",
            BackendKind::Google => "google",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            BackendKind::Ollama => None,
            BackendKind::OpenAI => Some("OPENAI_API_KEY"),
            BackendKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            BackendKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            BackendKind::Google => Some("GOOGLE_API_KEY"),
        }
    }

    fn to_llm(self) -> LLMBackend {
        match self {
            BackendKind::Ollama => LLMBackend::Ollama,
            BackendKind::OpenAI => LLMBackend::OpenAI,
            BackendKind::Anthropic => LLMBackend::Anthropic,
            BackendKind::OpenRouter => LLMBackend::OpenRouter,
            BackendKind::Google => LLMBackend::Google,
        }
    }
}

/// Connection and sampling settings for [`LlmBackend`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub backend: BackendKind,
    /// Base URL override (Ollama only).
    pub base_url: Option<String>,
    /// API key; `None` falls back to the backend's environment variable.
    pub api_key: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Context window in tokens, sent as Ollama's `num_ctx`.
    pub context_window: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            base_url: Some(DEFAULT_OLLAMA_URL.to_string()),
            api_key: None,
            model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 360,
            temperature: 0.7,
            max_tokens: None,
            context_window: None,
        }
    }
}

/// Chat model and embedder backed by the llm crate.
pub struct LlmBackend {
    settings: LlmSettings,
    api_key: Option<String>,
}

impl LlmBackend {
    /// Create a backend, resolving the API key from the environment when
    /// the settings carry none.
    ///
    /// Fails with [`MimirError::Configuration`] when a hosted backend has
    /// no key.
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let api_key = match (&settings.api_key, settings.backend.api_key_env()) {
            (Some(key), _) => Some(key.clone()),
            (None, None) => None,
            (None, Some(var)) => Some(std::env::var(var).map_err(|_| {
                MimirError::Configuration(format!(
                    "{} backend needs an API key; set {var}",
                    settings.backend.name()
                ))
            })?),
        };
        Ok(Self { settings, api_key })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Backend-specific request fields, merged into the request body.
    fn extra_body(&self) -> Option<Value> {
        match (self.settings.backend, self.settings.context_window) {
            (BackendKind::Ollama, Some(n)) => Some(json!({ "options": { "num_ctx": n } })),
            _ => None,
        }
    }

    /// Build an llm provider for `model`.
    fn build_provider(&self, model: &str, system: Option<&str>) -> Result<Box<dyn LLMProvider>> {
        let mut builder = LLMBuilder::new()
            .backend(self.settings.backend.to_llm())
            .model(model)
            .timeout_seconds(self.settings.timeout_secs)
            .temperature(self.settings.temperature);
        if let Some(ref key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(sys) = system {
            builder = builder.system(sys);
        }
        if let Some(max) = self.settings.max_tokens {
            builder = builder.max_tokens(max);
        }
        if let Some(extra) = self.extra_body() {
            builder = builder.extra_body(extra);
        }

        // Handle Ollama URL
        if self.settings.backend == BackendKind::Ollama
            && let Some(ref url) = self.settings.base_url
        {
            builder = builder.base_url(url.clone());
        }

        builder.build().map_err(|e| MimirError::Llm(e.to_string()))
    }
}

/// Convert our messages to llm crate messages
fn to_llm_messages(messages: &[Message]) -> Vec<LlmMessage> {
    messages
        .iter()
        .map(|msg| match msg.role {
            Role::User => LlmMessage::user().content(msg.content.clone()).build(),
            Role::Assistant => LlmMessage::assistant().content(msg.content.clone()).build(),
        })
        .collect()
}

#[async_trait]
impl ChatModel for LlmBackend {
    fn name(&self) -> &str {
        &self.settings.model
    }

    #[instrument(name = "llm.chat", skip(self, system, messages), fields(model = %self.settings.model, backend = self.settings.backend.name()))]
    async fn chat(&self, system: Option<&str>, messages: &[Message]) -> Result<String> {
        let provider = self.build_provider(&self.settings.model, system)?;
        let response = provider
            .chat(&to_llm_messages(messages))
            .await
            .map_err(MimirError::from)?;
        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(MimirError::EmptyResponse);
        }
        Ok(text)
    }

    #[instrument(name = "llm.chat_stream", skip(self, system, messages), fields(model = %self.settings.model, backend = self.settings.backend.name()))]
    async fn chat_stream(
        &self,
        system: Option<&str>,
        messages: &[Message],
    ) -> Result<EventStream> {
        let provider = self.build_provider(&self.settings.model, system)?;
        let stream = provider
            .chat_stream_with_tools(&to_llm_messages(messages), provider.tools())
            .await
            .map_err(MimirError::from)?;

        // Only text and the end marker matter for a chat answer.
        let converted = stream.filter_map(|result| {
            future::ready(match result {
                Ok(llm::chat::StreamChunk::Text(text)) => Some(Ok(GenerationEvent::Token(text))),
                Ok(llm::chat::StreamChunk::Done { .. }) => Some(Ok(GenerationEvent::Done)),
                Ok(_) => None,
                Err(e) => Some(Err(MimirError::from(e))),
            })
        });

        Ok(Box::pin(converted))
    }
}

#[async_trait]
impl Embedder for LlmBackend {
    fn model(&self) -> &str {
        &self.settings.embedding_model
    }

    #[instrument(name = "llm.embed", skip(self, texts), fields(model = %self.settings.embedding_model, count = texts.len()))]
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.build_provider(&self.settings.embedding_model, None)?;
        let vectors = provider
            .embed(texts.iter().map(|t| t.to_string()).collect())
            .await
            .map_err(MimirError::from)?;
        if vectors.len() != texts.len() {
            return Err(MimirError::Stream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}
