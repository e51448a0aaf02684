//! In-memory vector index over uploaded documents.
//!
//! Documents are split into overlapping character windows, each window is
//! embedded once (through the shared [`EmbeddingCache`]) and queries are
//! ranked by cosine similarity.

use std::sync::Arc;

use tracing::{debug, info};

use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::cache::embeddings::merge_batch_results;
use crate::types::SourceReference;
use crate::uploads::DocumentSet;
use crate::{MimirError, Result};

/// How documents are split before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Window length in characters. Default: 1024.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows. Default: 128.
    /// Clamped below `chunk_size`.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 128,
        }
    }
}

/// A piece of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Name of the upload the chunk came from.
    pub source: String,
    pub text: String,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn to_source(&self) -> SourceReference {
        SourceReference::new(&self.chunk.source, &self.chunk.text).with_score(self.score)
    }
}

/// Embedded chunks of one document set.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Arc<Vec<f32>>>,
}

impl VectorIndex {
    /// Chunk and embed every document. Only chunks missing from `cache` are
    /// sent to the embedder.
    pub async fn build(
        documents: &DocumentSet,
        embedder: &dyn Embedder,
        cache: &EmbeddingCache,
        config: &ChunkConfig,
    ) -> Result<Self> {
        let mut chunks = Vec::new();
        for upload in documents.files() {
            let text = upload.text()?;
            chunks.extend(
                chunk_text(text, config.chunk_size, config.chunk_overlap)
                    .into_iter()
                    .map(|text| Chunk {
                        source: upload.name().to_string(),
                        text,
                    }),
            );
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let cached = cache.get_batch(embedder.model(), &texts).await;
        let misses: Vec<&str> = texts
            .iter()
            .zip(&cached)
            .filter(|(_, slot)| slot.is_none())
            .map(|(text, _)| *text)
            .collect();

        let fresh = if misses.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&misses).await?
        };
        if fresh.len() != misses.len() {
            return Err(MimirError::Stream(format!(
                "embedder returned {} vectors for {} chunks",
                fresh.len(),
                misses.len()
            )));
        }
        for (text, vector) in misses.iter().zip(&fresh) {
            cache.insert(embedder.model(), text, vector.clone()).await;
        }

        let vectors = merge_batch_results(cached, fresh).ok_or_else(|| {
            MimirError::Stream("embedding batch could not be reassembled".to_string())
        })?;

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            embedded = misses.len(),
            "built vector index"
        );
        Ok(Self { chunks, vectors })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Best chunks for `query`: score at least `threshold`, highest first,
    /// at most `top_k`.
    pub fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(&self.vectors)
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        debug!(hits = scored.len(), top_k, threshold, "index search");
        scored
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`.
///
/// Windows that are only whitespace are dropped; the others are trimmed.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let step = size - overlap.min(size - 1);
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + size).min(char_count);
        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end == char_count {
            break;
        }
        start += step;
    }
    chunks
}

/// Cosine similarity; 0.0 when either vector has zero length or the
/// dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
