//! Retrieval parameter snapshot.

use serde::{Deserialize, Serialize};

use crate::{MimirError, Result};

/// Default number of documents requested per retrieval.
pub const DEFAULT_NUM_DOCS: u32 = 5;

/// Default minimum similarity score for a retrieved chunk.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Retrieval configuration in effect for a single query.
///
/// Equality is exact on both fields, including the float. Thresholds come
/// from discrete UI steps, so two snapshots taken from the same control
/// setting compare equal bit-for-bit.
///
/// ```rust
/// # use mimir::RetrievalParams;
/// let params = RetrievalParams::new(3, 0.5).unwrap();
/// assert_eq!(params, RetrievalParams::new(3, 0.5).unwrap());
/// assert_ne!(params, RetrievalParams::new(3, 0.55).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    num_docs: u32,
    similarity_threshold: f32,
}

impl RetrievalParams {
    /// Create a validated snapshot.
    ///
    /// Fails with [`MimirError::InvalidInput`] when `num_docs` is zero or the
    /// threshold falls outside `[0.0, 1.0]` (NaN included).
    pub fn new(num_docs: u32, similarity_threshold: f32) -> Result<Self> {
        if num_docs == 0 {
            return Err(MimirError::InvalidInput(
                "num_docs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(MimirError::InvalidInput(format!(
                "similarity_threshold must be within [0.0, 1.0], got {similarity_threshold}"
            )));
        }
        Ok(Self {
            num_docs,
            similarity_threshold,
        })
    }

    /// Documents requested per retrieval.
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// Minimum similarity score a chunk needs to be retrieved.
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Copy with a different document count.
    pub fn with_num_docs(self, num_docs: u32) -> Result<Self> {
        Self::new(num_docs, self.similarity_threshold)
    }

    /// Copy with a different similarity threshold.
    pub fn with_similarity_threshold(self, similarity_threshold: f32) -> Result<Self> {
        Self::new(self.num_docs, similarity_threshold)
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            num_docs: DEFAULT_NUM_DOCS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}
