use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by the CORS layer. Empty means any origin (no credentials).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

/// Where and how repositories are cloned
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Each analysis clones into `{workdir_prefix}_{uuid}`
    #[serde(default = "default_workdir_prefix")]
    pub workdir_prefix: PathBuf,
    /// Shallow clone depth; 0 performs a full clone
    #[serde(default = "default_clone_depth")]
    pub clone_depth: i32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            workdir_prefix: default_workdir_prefix(),
            clone_depth: default_clone_depth(),
        }
    }
}

fn default_workdir_prefix() -> PathBuf {
    PathBuf::from("./repo_data")
}

fn default_clone_depth() -> i32 {
    1
}

/// Loading and splitting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
    /// Files with at most this many lines are kept whole
    #[serde(default = "default_parser_threshold")]
    pub parser_threshold: usize,
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            suffixes: default_suffixes(),
            parser_threshold: default_parser_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_suffixes() -> Vec<String> {
    [".py", ".js", ".go", ".java", ".ts", ".md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_parser_threshold() -> usize {
    500
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    200
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// OpenAI-compatible base URL (the client appends `/embeddings`)
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
    /// Name of the env var holding an optional bearer key
    #[serde(default = "default_embeddings_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_embeddings_base_url(),
            model: default_embeddings_model(),
            api_key_env: default_embeddings_api_key_env(),
            batch_size: default_batch_size(),
            dimensions: default_dimensions(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_embeddings_base_url() -> String {
    "http://localhost:8081/v1".to_string()
}

fn default_embeddings_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embeddings_api_key_env() -> String {
    "EMBEDDINGS_API_KEY".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_dimensions() -> usize {
    384
}

fn default_cache_capacity() -> usize {
    1000
}

/// Vector store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    /// Write every rebuilt store to `db_path` and restore it on demand
    #[serde(default)]
    pub persist: bool,
    #[serde(default = "default_vector_db_path")]
    pub db_path: PathBuf,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            persist: false,
            db_path: default_vector_db_path(),
        }
    }
}

fn default_vector_db_path() -> PathBuf {
    PathBuf::from("./vector_db/codescribe.db")
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// Language model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (the client appends `/chat/completions`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_llm_model() -> String {
    "google/flan-t5-base".to_string()
}

fn default_llm_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

fn default_max_new_tokens() -> u32 {
    250
}

fn default_temperature() -> f32 {
    0.1
}

fn default_llm_timeout_secs() -> u64 {
    300
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CODESCRIBE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    /// 3. Built-in defaults when neither exists
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        match std::env::var("CODESCRIBE_CONFIG") {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let default_path = Path::new("config.toml");
                if default_path.exists() {
                    Self::load_from(default_path)
                } else {
                    log::info!("No config.toml found, using built-in defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ingest.suffixes.is_empty() {
            anyhow::bail!("ingest.suffixes must list at least one file suffix");
        }

        if self.ingest.chunk_size == 0 {
            anyhow::bail!("ingest.chunk_size must be greater than 0");
        }

        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            anyhow::bail!("ingest.chunk_overlap must be less than chunk_size");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.repository.clone_depth < 0 {
            anyhow::bail!("repository.clone_depth must be 0 (full clone) or positive");
        }

        Ok(())
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Path of the persisted vector store database
    pub fn vector_db_path(&self) -> &Path {
        &self.vector_store.db_path
    }
}
