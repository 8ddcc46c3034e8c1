use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3.1";
pub const DEFAULT_PERSONA: &str = "You are a Level 1 SOC analyst analyzing server logs.";
pub const DEFAULT_PROMPT_TEMPLATE: &str = "{persona}
Use the context below to answer the question as precisely and concisely as possible.
{context}
Question: {question}
Answer:";

const APP_DIR: &str = "logsage";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(APP_DIR))
    }

    pub fn metrics_db_path() -> Option<PathBuf> {
        Self::data_dir().map(|p| p.join("metrics.db"))
    }

    /// Socket the daemon listens on.
    pub fn socket_path(&self) -> PathBuf {
        self.daemon.socket_path.clone().unwrap_or_else(|| {
            Self::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("logsage.sock")
        })
    }

    pub fn pid_path(&self) -> PathBuf {
        self.socket_path().with_extension("pid")
    }

    /// Directory uploaded files are written to before loading.
    pub fn upload_dir(&self) -> PathBuf {
        self.ingestion.upload_dir.clone().unwrap_or_else(|| {
            Self::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("uploads")
        })
    }

    /// Load the config file (defaults if absent), apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Apply `LOGSAGE_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LOGSAGE_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(model) = lookup("LOGSAGE_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("LOGSAGE_COMPLETION_URL") {
            self.completion.url = url;
        }
        if let Some(model) = lookup("LOGSAGE_COMPLETION_MODEL") {
            self.completion.model = model;
        }
        if let Some(path) = lookup("LOGSAGE_SOCKET_PATH") {
            self.daemon.socket_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.max_chunk_chars == 0 || chunking.overlap_chars >= chunking.max_chunk_chars {
            return Err(ConfigError::InvalidChunking {
                max: chunking.max_chunk_chars,
                overlap: chunking.overlap_chars,
            });
        }
        if self.retrieval.default_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.default_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_context_chars must be at least 1".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    16
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_persona")]
    pub persona: String,

    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_completion_timeout() -> u64 {
    120
}

fn default_persona() -> String {
    DEFAULT_PERSONA.to_string()
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            persona: default_persona(),
            prompt_template: default_prompt_template(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    #[serde(default)]
    pub overlap_chars: usize,
}

fn default_max_chunk_chars() -> usize {
    500
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_k() -> usize {
    4
}

fn default_max_context_chars() -> usize {
    6000
}

fn default_query_timeout() -> u64 {
    180
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_context_chars: default_max_context_chars(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_ingest_timeout")]
    pub timeout_secs: u64,
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_ingest_timeout() -> u64 {
    1800
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            timeout_secs: default_ingest_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub retry_timeouts: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_timeouts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Seconds without requests before the daemon exits; 0 disables.
    #[serde(default)]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_auto_start() -> bool {
    true
}

fn default_max_frame_bytes() -> usize {
    // base64 inflates uploads by 4/3
    96 * 1024 * 1024
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            auto_start: default_auto_start(),
            idle_timeout_secs: 0,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    7
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}
