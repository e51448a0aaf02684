//! Engine response and completion types

use std::fmt;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use super::source::{SourceReference, format_sources};
use crate::Result;

/// Events emitted during streaming generation
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Text fragment
    Token(String),

    /// Stream complete
    Done,
}

/// Boxed stream of generation events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<GenerationEvent>> + Send>>;

/// What an engine hands back for a prompt.
pub enum EngineResponse {
    /// The whole answer at once.
    Complete {
        text: String,
        sources: Vec<SourceReference>,
    },
    /// A lazy token stream. Sources are known before the first token.
    Stream {
        events: EventStream,
        sources: Vec<SourceReference>,
    },
}

impl EngineResponse {
    pub fn complete(text: impl Into<String>) -> Self {
        EngineResponse::Complete {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn sources(&self) -> &[SourceReference] {
        match self {
            EngineResponse::Complete { sources, .. } | EngineResponse::Stream { sources, .. } => {
                sources
            }
        }
    }
}

impl fmt::Debug for EngineResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineResponse::Complete { text, sources } => f
                .debug_struct("Complete")
                .field("text", text)
                .field("sources", sources)
                .finish(),
            EngineResponse::Stream { sources, .. } => f
                .debug_struct("Stream")
                .field("sources", sources)
                .finish_non_exhaustive(),
        }
    }
}

/// Chat mode selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Answers grounded in retrieval over uploaded documents.
    Rag,
    /// Unconstrained generation.
    #[default]
    Plain,
}

impl Mode {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Rag => "rag",
            Mode::Plain => "plain",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a completion came from a successful generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    Success,
    /// The engine failed; `response` holds the message shown in its place.
    Failure,
}

/// A fully assembled answer, ready to show or cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub kind: CompletionKind,
    pub response: String,
    /// Formatted source references, `None` for non-retrieval answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

impl Completion {
    pub fn success(response: impl Into<String>, sources: &[SourceReference]) -> Self {
        Self {
            kind: CompletionKind::Success,
            response: response.into(),
            sources: format_sources(sources),
        }
    }

    /// Degraded-mode answer carrying the error text.
    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            kind: CompletionKind::Failure,
            response: format!("An error occurred while generating a response: {error}"),
            sources: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == CompletionKind::Success
    }
}
