//! Bounded FIFO cache of completed answers.
//!
//! [`QueryCache`] maps `(prompt, RetrievalParams)` to the final answer text
//! and its formatted sources. It keeps the most recent N insertions and
//! evicts the oldest insertion first; a hit does not refresh an entry.
//!
//! Entries are never removed when parameters or documents change. A lookup
//! made under new parameters simply cannot match entries recorded under
//! old ones, so stale answers become unreachable without being purged.
//!
//! The cache is plain owned state with `&mut self` insertion: a session
//! owns one cache per mode and a turn holds the only mutable borrow, so an
//! answer is visible from the next turn onwards and never to the turn
//! that is still generating it.

use std::collections::VecDeque;

use tracing::debug;

use crate::telemetry;
use crate::types::{Mode, RetrievalParams};

/// Configuration for the query cache.
///
/// ```rust
/// # use mimir::CacheConfig;
/// let config = CacheConfig::new().capacity(25);
/// assert_eq!(config.capacity, 25);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached answers. Default: 10. Zero is treated as one.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached answers.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }
}

/// One completed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub prompt: String,
    pub parameters: RetrievalParams,
    pub response: String,
    pub sources: Option<String>,
}

impl CacheEntry {
    fn matches(&self, prompt: &str, parameters: &RetrievalParams) -> bool {
        self.prompt == prompt && self.parameters == *parameters
    }
}

/// Answer returned on a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: String,
    pub sources: Option<String>,
}

/// Most-recent-N answer cache with FIFO eviction.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: VecDeque<CacheEntry>,
    capacity: usize,
    mode: Mode,
}

impl QueryCache {
    /// Create an empty cache for the given mode.
    ///
    /// The mode only labels metrics.
    pub fn new(config: &CacheConfig, mode: Mode) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            mode,
        }
    }

    /// Record a completed answer, evicting the oldest entry when full.
    pub fn put(
        &mut self,
        prompt: impl Into<String>,
        parameters: RetrievalParams,
        response: impl Into<String>,
        sources: Option<String>,
    ) {
        if self.entries.len() == self.capacity
            && let Some(evicted) = self.entries.pop_front()
        {
            debug!(mode = %self.mode, prompt = %evicted.prompt, "query cache evicted oldest entry");
        }
        self.entries.push_back(CacheEntry {
            prompt: prompt.into(),
            parameters,
            response: response.into(),
            sources,
        });
    }

    /// Look up an answer by exact prompt and parameters.
    ///
    /// Scans newest first. Emits cache hit/miss metrics.
    pub fn get(&self, prompt: &str, parameters: &RetrievalParams) -> Option<CachedResponse> {
        let hit = self
            .entries
            .iter()
            .rev()
            .find(|entry| entry.matches(prompt, parameters))
            .map(|entry| CachedResponse {
                response: entry.response.clone(),
                sources: entry.sources.clone(),
            });

        let mode = self.mode.as_str();
        if hit.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "mode" => mode).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "mode" => mode).increment(1);
        }
        debug!(mode, hit = hit.is_some(), "query cache probe");
        hit
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached answers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }
}
