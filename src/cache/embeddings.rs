//! Shared cache of chunk embeddings.
//!
//! Every parameter or document change throws the retrieval engine away and
//! re-indexes. Chunk embeddings are deterministic for a given model, so
//! [`EmbeddingCache`] keeps them across rebuilds: changing the similarity
//! threshold re-embeds nothing, and re-uploading a document set with one
//! new file only embeds the new file's chunks.
//!
//! Uses moka's async-friendly LRU + TTL cache keyed on a content hash of
//! (model, text). The cache is internally synchronised and can be shared
//! by every session in a process; it only affects indexing cost, never
//! answers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::telemetry;

/// Configuration for the embedding cache.
///
/// ```rust
/// # use mimir::EmbeddingCacheConfig;
/// # use std::time::Duration;
/// let config = EmbeddingCacheConfig::new()
///     .max_entries(50_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    /// Maximum number of cached vectors. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached vectors. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl EmbeddingCacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached vectors.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached vectors.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// In-memory embedding cache. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct EmbeddingCache {
    cache: Cache<u64, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a new embedding cache with the given configuration.
    pub fn new(config: &EmbeddingCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up a cached vector. Emits hit/miss metrics.
    pub async fn get(&self, model: &str, text: &str) -> Option<Arc<Vec<f32>>> {
        let hit = self.cache.get(&cache_key(model, text)).await;
        if hit.is_some() {
            metrics::counter!(telemetry::EMBEDDING_CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(telemetry::EMBEDDING_CACHE_MISSES_TOTAL).increment(1);
        }
        hit
    }

    /// Insert a vector.
    pub async fn insert(&self, model: &str, text: &str, vector: Vec<f32>) {
        self.cache
            .insert(cache_key(model, text), Arc::new(vector))
            .await;
    }

    /// Check the cache for many texts at once.
    ///
    /// Returns one slot per text in the same order: `Some` for hits, `None`
    /// for misses. The caller embeds only the misses and reassembles with
    /// [`merge_batch_results`].
    pub async fn get_batch(&self, model: &str, texts: &[&str]) -> Vec<Option<Arc<Vec<f32>>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.get(model, text).await);
        }
        results
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(&EmbeddingCacheConfig::default())
    }
}

/// Compute a cache key from model and text.
///
/// `DefaultHasher` is deterministic within a process lifetime, which is
/// all an in-memory cache needs.
fn cache_key(model: &str, text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

/// Merge cached hits with freshly embedded misses.
///
/// Returns `None` when `fresh` does not hold exactly one vector per miss.
pub(crate) fn merge_batch_results(
    cached: Vec<Option<Arc<Vec<f32>>>>,
    fresh: Vec<Vec<f32>>,
) -> Option<Vec<Arc<Vec<f32>>>> {
    let misses = cached.iter().filter(|slot| slot.is_none()).count();
    if misses != fresh.len() {
        return None;
    }
    let mut fresh = fresh.into_iter();
    cached
        .into_iter()
        .map(|slot| slot.or_else(|| fresh.next().map(Arc::new)))
        .collect()
}
