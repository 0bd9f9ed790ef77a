use crate::rag::{IndexSpec, IndexType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable that overrides the vector store address.
pub const STORE_URL_ENV: &str = "RAGWIRE_STORE_URL";

/// Environment variable that overrides the inference API key regardless of
/// `llm.api_key_env`.
pub const LLM_API_KEY_ENV: &str = "RAGWIRE_LLM_API_KEY";

/// Configuration for the whole pipeline.
///
/// Every section has defaults, so a partial `config.yaml` only needs the keys
/// that differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Hosted inference endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
}

/// Embedding model served over an Ollama-compatible `/api/embed` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
    /// Vector dimensionality; every stored vector must have this length.
    pub dimensions: usize,
}

/// Chunking, batching and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Records per upsert request
    pub batch_size: usize,
    pub top_k: usize,
}

/// Vector database storage mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Remote Qdrant server reached over gRPC
    Grpc { url: String },
    /// Embedded LanceDB dataset on local disk
    Embedded { path: String },
    /// Process-local store, lost on exit
    Memory,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Grpc {
            url: "http://localhost:6334".to_string(),
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    /// Collection (Qdrant) or table (LanceDB) name
    pub collection_name: String,
    /// Name of the environment variable holding the store API key, if any.
    #[serde(default = "default_store_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub index: IndexSpec,
}

/// Where `export` writes and `migrate` reads by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub path: PathBuf,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. When a question may concern the user's stored documents, \
     call the search_knowledge_base tool before answering and ground your answer in what it returns."
        .to_string()
}

fn default_store_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen.qwen3-coder-30b-a3b-v1:0".to_string(),
            base_url: "https://bedrock-runtime.us-east-1.amazonaws.com/openai/v1".to_string(),
            max_tokens: 512,
            temperature: None,
            api_key_env: "AWS_BEARER_TOKEN_BEDROCK".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimensions: 384,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 100,
            top_k: 3,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            collection_name: "ragwire_kb".to_string(),
            api_key_env: default_store_api_key_env(),
            index: IndexSpec::default(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vector_export.json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            system_prompt: default_system_prompt(),
            rag: RagConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Applies the store address override from the environment.
    ///
    /// Only the remote store honors it; credentials are looked up lazily by
    /// the clients that need them.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(STORE_URL_ENV) {
            if let StorageMode::Grpc { url: current } = &mut self.storage.storage_mode {
                *current = url;
            }
        }
    }

    /// Resolves the inference bearer token, preferring [`LLM_API_KEY_ENV`].
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var(LLM_API_KEY_ENV)
            .or_else(|_| std::env::var(&self.llm.api_key_env))
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// Resolves the vector store API key, if one is set.
    pub fn store_api_key(&self) -> Option<String> {
        std::env::var(&self.storage.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be greater than 0".into()));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.batch_size == 0 {
            return Err(ConfigError::Invalid("rag.batch_size must be greater than 0".into()));
        }
        if rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be greater than 0".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid("embedding.dimensions must be greater than 0".into()));
        }
        if self.storage.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.collection_name must not be empty".into()));
        }
        if self.storage.index.index_type != IndexType::Flat && self.storage.index.nlist == 0 {
            return Err(ConfigError::Invalid("storage.index.nlist must be greater than 0".into()));
        }
        Ok(())
    }
}
