//! Source references returned by retrieval engines.

use serde::{Deserialize, Serialize};

/// Characters of chunk text shown per reference.
const SNIPPET_CHARS: usize = 200;

/// One retrieved passage backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Where the passage came from (usually the uploaded file name).
    pub identifier: String,
    /// Passage text.
    pub text: String,
    /// Similarity score against the query, when the engine reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl SourceReference {
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            relevance_score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Markdown rendering of this reference.
    pub fn format(&self) -> String {
        let score = self
            .relevance_score
            .map(|s| format!(" (Similarity: {s:.2})"))
            .unwrap_or_default();
        format!("📄 **{}**{score}\n> {}", self.identifier, snippet(&self.text))
    }
}

/// Render references as the text stored alongside a cached answer.
///
/// Returns `None` for an empty list so that non-retrieval answers and
/// retrieval answers without matches both carry no sources.
pub fn format_sources(sources: &[SourceReference]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    Some(
        sources
            .iter()
            .map(SourceReference::format)
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
