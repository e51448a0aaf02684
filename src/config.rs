//! Configuration loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.mimir/config.toml` (user)
//! 3. `/etc/mimir/config.toml` (system)
//!
//! Unlike an explicit path, the default locations are optional: when
//! neither exists the built-in defaults apply. API keys are never read
//! from the file; hosted backends take them from their environment
//! variable (see [`BackendKind::api_key_env`]).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{CacheConfig, EmbeddingCacheConfig};
use crate::engine::backend::{BackendKind, DEFAULT_OLLAMA_URL};
use crate::engine::{
    ChunkConfig, DEFAULT_MEMORY_TOKEN_LIMIT, DEFAULT_STREAM_BUFFER, DEFAULT_SYSTEM_PROMPT,
    EngineSettings, LlmSettings,
};
use crate::types::{DEFAULT_NUM_DOCS, DEFAULT_SIMILARITY_THRESHOLD, RetrievalParams};
use crate::{MimirError, Result};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Model runtime and generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Runtime URL (Ollama only, default: http://localhost:11434).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Request timeout in seconds (default: 360).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Model context window in tokens (default: 1024).
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// History budget in estimated tokens (default: 4000).
    #[serde(default = "default_memory_token_limit")]
    pub memory_token_limit: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout(),
            context_window: default_context_window(),
            temperature: default_temperature(),
            max_tokens: None,
            system_prompt: default_system_prompt(),
            memory_token_limit: default_memory_token_limit(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_timeout() -> u64 {
    360
}

fn default_context_window() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_memory_token_limit() -> usize {
    DEFAULT_MEMORY_TOKEN_LIMIT
}

/// Initial retrieval parameters and chunking.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_num_docs")]
    pub num_docs: u32,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_docs: default_num_docs(),
            similarity_threshold: default_similarity_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_num_docs() -> u32 {
    DEFAULT_NUM_DOCS
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_chunk_size() -> usize {
    ChunkConfig::default().chunk_size
}

fn default_chunk_overlap() -> usize {
    ChunkConfig::default().chunk_overlap
}

/// Cache sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Answers kept per session and mode (default: 10).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Chunk embeddings kept across sessions (default: 10000).
    #[serde(default = "default_embedding_cache_entries")]
    pub embedding_cache_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            embedding_cache_entries: default_embedding_cache_entries(),
        }
    }
}

fn default_capacity() -> usize {
    CacheConfig::default().capacity
}

fn default_embedding_cache_entries() -> u64 {
    10_000
}

/// Where uploads and feedback go. A leading `~/` is expanded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    #[serde(default)]
    pub feedback_file: Option<PathBuf>,
}

impl StorageConfig {
    /// Upload directory (default: `<cache dir>/mimir/uploads`).
    pub fn uploads_dir(&self) -> PathBuf {
        match &self.uploads_dir {
            Some(path) => expand_home(path),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mimir")
                .join("uploads"),
        }
    }

    /// Feedback file (default: `<data dir>/mimir/feedback_data.json`).
    pub fn feedback_file(&self) -> PathBuf {
        match &self.feedback_file {
            Some(path) => expand_home(path),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mimir")
                .join("feedback_data.json"),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided, must exist)
    /// 2. `~/.mimir/config.toml`
    /// 3. `/etc/mimir/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse one file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MimirError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            MimirError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.retrieval_params()?;
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MimirError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mimir").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/mimir/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Starting retrieval parameters.
    pub fn retrieval_params(&self) -> Result<RetrievalParams> {
        RetrievalParams::new(
            self.retrieval.num_docs,
            self.retrieval.similarity_threshold,
        )
        .map_err(|e| MimirError::Configuration(format!("[retrieval] {e}")))
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            backend: self.llm.backend,
            base_url: Some(self.llm.base_url.clone()),
            api_key: None,
            model: self.llm.model.clone(),
            embedding_model: self.llm.embedding_model.clone(),
            timeout_secs: self.llm.timeout_secs,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            context_window: Some(self.llm.context_window),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            system_prompt: self.llm.system_prompt.clone(),
            memory_token_limit: self.llm.memory_token_limit,
            chunking: ChunkConfig {
                chunk_size: self.retrieval.chunk_size,
                chunk_overlap: self.retrieval.chunk_overlap,
            },
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().capacity(self.cache.capacity)
    }

    pub fn embedding_cache_config(&self) -> EmbeddingCacheConfig {
        EmbeddingCacheConfig::new().max_entries(self.cache.embedding_cache_entries)
    }
}
