use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data_embedding: DataEmbeddingConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub sql_agent: SqlAgentConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Source directories, chunking and retrieval settings
#[derive(Debug, Clone, Deserialize)]
pub struct DataEmbeddingConfig {
    /// Root holding one sub-directory per collection (`data_root/<collection>/info.md`).
    pub data_root: PathBuf,
    /// Glob, relative to `data_root`, selecting which sub-directories get indexed.
    #[serde(default = "default_data_dir_re")]
    pub data_dir_re: String,
    /// Root holding one persisted index per collection (`vectordb_dir/<collection>/`).
    pub vectordb_dir: PathBuf,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_info_doc_name")]
    pub info_doc_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// `openai` or `hashing` (offline, deterministic)
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// SQL question-answering tool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SqlAgentConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for SqlAgentConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/sql/chinook.db"),
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
            base_url: default_openai_base_url(),
            max_iterations: default_max_iterations(),
            max_rows: default_max_rows(),
        }
    }
}

/// Document loader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// External command used to turn `.doc` files into PDF (LibreOffice CLI compatible).
    #[serde(default = "default_doc_converter")]
    pub doc_converter: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            doc_converter: default_doc_converter(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir_re() -> String {
    "*".to_string()
}

fn default_collection_name() -> String {
    "rag-chroma".to_string()
}

fn default_info_doc_name() -> String {
    "info.md".to_string()
}

fn default_score_threshold() -> f32 {
    0.4
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_max_iterations() -> usize {
    3
}

fn default_max_rows() -> usize {
    50
}

fn default_doc_converter() -> String {
    "soffice".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ACCORD_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Optional .env; a missing file is fine
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ACCORD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
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
    fn validate(&self) -> Result<()> {
        let data = &self.data_embedding;

        if !data.data_root.is_dir() {
            anyhow::bail!(
                "data_embedding.data_root is not a directory: {}",
                data.data_root.display()
            );
        }

        if data.chunk_size == 0 {
            anyhow::bail!("data_embedding.chunk_size must be greater than 0");
        }

        if data.chunk_overlap >= data.chunk_size {
            anyhow::bail!("data_embedding.chunk_overlap must be less than chunk_size");
        }

        if data.batch_size == 0 {
            anyhow::bail!("data_embedding.batch_size must be greater than 0");
        }

        if data.k == 0 {
            anyhow::bail!("data_embedding.k must be greater than 0");
        }

        if !(0.0..=1.0).contains(&data.score_threshold) {
            anyhow::bail!("data_embedding.score_threshold must be between 0.0 and 1.0");
        }

        if data.info_doc_name.trim().is_empty() {
            anyhow::bail!("data_embedding.info_doc_name must not be empty");
        }

        globset::Glob::new(&data.data_dir_re)
            .with_context(|| format!("Invalid data_dir_re glob: {}", data.data_dir_re))?;

        match self.embeddings.provider.as_str() {
            "openai" => {
                std::env::var(&self.embeddings.api_key_env).with_context(|| {
                    format!(
                        "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                        self.embeddings.api_key_env
                    )
                })?;
            }
            "hashing" => {}
            other => anyhow::bail!("Unknown embeddings.provider: {}", other),
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        Ok(())
    }

    /// Root of the per-collection source directories
    pub fn data_root(&self) -> &Path {
        &self.data_embedding.data_root
    }

    /// Root of the per-collection persisted indexes
    pub fn vectordb_dir(&self) -> &Path {
        &self.data_embedding.vectordb_dir
    }
}
