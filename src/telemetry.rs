//! Telemetry metric name constants.
//!
//! Centralised metric names for mimir operations. Embedders install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mimir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `mode`: "rag" or "plain"
//! - `status`: outcome, one of "ok", "error", "cached" or "no_documents"

/// Total query cache hits.
///
/// Labels: `mode`.
pub const CACHE_HITS_TOTAL: &str = "mimir_cache_hits_total";

/// Total query cache misses.
///
/// Labels: `mode`.
pub const CACHE_MISSES_TOTAL: &str = "mimir_cache_misses_total";

/// Total generation engines built (initial builds and rebuilds).
///
/// Labels: `mode`.
pub const ENGINE_BUILDS_TOTAL: &str = "mimir_engine_builds_total";

/// Total chat turns handled.
///
/// Labels: `mode`, `status` ("ok" | "error" | "cached" | "no_documents").
pub const TURNS_TOTAL: &str = "mimir_turns_total";

/// Wall-clock time from prompt to final answer, in seconds.
///
/// Labels: `mode`, `status`.
pub const RESPONSE_DURATION_SECONDS: &str = "mimir_response_duration_seconds";

/// Total embedding cache hits inside the retrieval index.
pub const EMBEDDING_CACHE_HITS_TOTAL: &str = "mimir_embedding_cache_hits_total";

/// Total embedding cache misses inside the retrieval index.
pub const EMBEDDING_CACHE_MISSES_TOTAL: &str = "mimir_embedding_cache_misses_total";
