//! Configuration management for ragpipe.
//!
//! Settings are layered, later sources winning:
//! - Built-in defaults
//! - YAML config file (`RAGPIPE_CONFIG` or `./ragpipe.yaml`)
//! - Environment variables
//! - Command-line flags (`AppConfig::with_overrides`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "ragpipe.yaml";

/// Embedding providers known to the factory.
pub const KNOWN_EMBEDDING_PROVIDERS: &[&str] = &["trigram"];

/// Language-model providers known to the factory.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["extractive"];

/// Retrieval modes accepted in configuration.
pub const KNOWN_MODES: &[&str] = &["vector", "graph", "hybrid", "naive"];

/// Similarity metrics accepted in configuration.
pub const KNOWN_METRICS: &[&str] = &["cosine", "dot", "euclidean"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file this configuration was merged from, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Log filter override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    #[serde(default)]
    pub verbose: bool,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Embedding collaborator and vector index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name ("trigram")
    pub provider: String,

    /// Embedding vector dimension, fixed for the index lifetime
    pub dimensions: usize,

    /// Longest input accepted by the embedder, in characters
    pub max_input_chars: usize,

    /// Similarity metric ("cosine", "dot", "euclidean")
    pub metric: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            dimensions: 384,
            max_input_chars: 8192,
            metric: "cosine".to_string(),
        }
    }
}

/// Chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingSettings {
    /// Maximum chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
        }
    }
}

/// Retrieval defaults applied when a query does not specify them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    pub top_k: usize,

    /// Retrieval mode ("vector", "graph", "hybrid", "naive")
    pub mode: String,

    /// Weight of the vector score in hybrid mode (0.0 - 1.0)
    pub hybrid_alpha: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            mode: "vector".to_string(),
            hybrid_alpha: 0.5,
        }
    }
}

/// Language-model collaborator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// Provider name ("extractive")
    pub provider: String,

    /// Model identifier passed through to the provider
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Handlebars system prompt replacing the bundled one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_template: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "extractive".to_string(),
            model: "extractive-v1".to_string(),
            temperature: None,
            max_tokens: None,
            system_template: None,
        }
    }
}

/// On-disk YAML layout. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
    generation: Option<GenerationSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a config file (if any) and environment.
    ///
    /// `config_file` takes precedence over `RAGPIPE_CONFIG`.
    ///
    /// Environment variables:
    /// - `RAGPIPE_CONFIG`: Path to config file
    /// - `RAGPIPE_TOP_K`: Default top-k
    /// - `RAGPIPE_MODE`: Default retrieval mode
    /// - `RAGPIPE_EMBEDDING_PROVIDER`: Embedding provider
    /// - `RAGPIPE_LLM_PROVIDER`: Language-model provider
    /// - `RAGPIPE_MODEL`: Model identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragpipe_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("top_k: {}", config.retrieval.top_k);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RAGPIPE_CONFIG").ok().map(PathBuf::from));
        let mut config = Self::load_from(explicit.as_deref())?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load defaults merged with a YAML file.
    ///
    /// An explicit path must exist; without one, `./ragpipe.yaml` is used
    /// when present.
    pub fn load_from(path: Option<&Path>) -> AppResult<Self> {
        let config = Self::default();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                config.merge_yaml(path)
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    config.merge_yaml(&default_path)
                } else {
                    Ok(config)
                }
            }
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Environment variables override file settings.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(top_k) = std::env::var("RAGPIPE_TOP_K") {
            self.retrieval.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("RAGPIPE_TOP_K is not a positive integer: {}", top_k))
            })?;
        }

        if let Ok(mode) = std::env::var("RAGPIPE_MODE") {
            self.retrieval.mode = mode;
        }

        if let Ok(provider) = std::env::var("RAGPIPE_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(provider) = std::env::var("RAGPIPE_LLM_PROVIDER") {
            self.generation.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGPIPE_MODEL") {
            self.generation.model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over the file and environment.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Validate settings before components are built from them.
    pub fn validate(&self) -> AppResult<()> {
        check_known("embedding provider", &self.embedding.provider, KNOWN_EMBEDDING_PROVIDERS)?;
        check_known("LLM provider", &self.generation.provider, KNOWN_LLM_PROVIDERS)?;
        check_known("retrieval mode", &self.retrieval.mode, KNOWN_MODES)?;
        check_known("similarity metric", &self.embedding.metric, KNOWN_METRICS)?;

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.embedding.max_input_chars == 0 {
            return Err(AppError::Config(
                "Embedding maxInputChars must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "Retrieval topK must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.hybrid_alpha) {
            return Err(AppError::Config(format!(
                "Retrieval hybridAlpha must be within 0.0-1.0, got {}",
                self.retrieval.hybrid_alpha
            )));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        Ok(())
    }
}

fn check_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}
