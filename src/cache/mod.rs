//! Caching subsystem.
//!
//! Two independent caches:
//!
//! - [`QueryCache`]: per-session FIFO cache of completed answers keyed on
//!   (prompt, retrieval parameters). Consulted before every generation.
//!
//! - [`EmbeddingCache`]: process-wide LRU + TTL cache of chunk embeddings,
//!   so rebuilding a retrieval engine after a parameter change does not
//!   re-embed unchanged documents.

pub mod embeddings;
pub mod query;

pub use embeddings::{EmbeddingCache, EmbeddingCacheConfig};
pub use query::{CacheConfig, CacheEntry, CachedResponse, QueryCache};
