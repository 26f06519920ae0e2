//! Configuration loading.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables, so a deployment can run from the environment
//! alone. The resolved [`Config`] is immutable and passed explicitly to the
//! components that need it; nothing below `main` reads the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding the persisted vector store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("chroma")
}
fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root scanned for PDFs and where uploads are saved.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Source file name every `/answer` call is restricted to.
    #[serde(default)]
    pub default_source: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            threshold: default_threshold(),
            default_source: None,
        }
    }
}

fn default_k() -> usize {
    8
}
fn default_threshold() -> f32 {
    0.5
}

/// Which backend embeds text and, for cloud providers, answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Provider {
    Local,
    Google,
    OpenAI,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Provider::Local),
            "GOOGLE" => Ok(Provider::Google),
            "OPENAI" => Ok(Provider::OpenAI),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl TryFrom<String> for Provider {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Local => "LOCAL",
            Provider::Google => "GOOGLE",
            Provider::OpenAI => "OPENAI",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_openai_embedding_model")]
    pub openai_model: String,
    #[serde(default = "default_google_embedding_model")]
    pub google_model: String,
    #[serde(default = "default_hf_model")]
    pub hf_model: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_google_base_url")]
    pub google_base_url: String,
    /// Chunks embedded and inserted per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts per batch before an ingest fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            openai_model: default_openai_embedding_model(),
            google_model: default_google_embedding_model(),
            hf_model: default_hf_model(),
            openai_api_key: None,
            google_api_key: None,
            openai_base_url: default_openai_base_url(),
            google_base_url: default_google_base_url(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> Provider {
    Provider::Google
}
fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_google_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_hf_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_google_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_google_chat_model")]
    pub google_model: String,
    #[serde(default = "default_openai_chat_model")]
    pub openai_model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            google_model: default_google_chat_model(),
            openai_model: default_openai_chat_model(),
        }
    }
}

fn default_google_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_openai_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load from an optional TOML file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] but reads overrides through `env`.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&content).with_context(|| "Failed to parse config file")?
            }
            None => Config::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty variables count as unset, matching how .env files are written.
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EMBEDDING_PROVIDER") {
            self.embedding.provider = v.parse()?;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embedding.openai_model = v;
        }
        if let Some(v) = get("GOOGLE_EMBEDDING_MODEL") {
            self.embedding.google_model = v;
        }
        if let Some(v) = get("HF_EMBEDDING_MODEL") {
            self.embedding.hf_model = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.embedding.openai_api_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_API_KEY") {
            self.embedding.google_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.embedding.openai_base_url = v;
        }
        if let Some(v) = get("GOOGLE_BASE_URL") {
            self.embedding.google_base_url = v;
        }
        if let Some(v) = get("GOOGLE_CHAT_MODEL") {
            self.chat.google_model = v;
        }
        if let Some(v) = get("OPENAI_CHAT_MODEL") {
            self.chat.openai_model = v;
        }
        if let Some(v) = get("RETRIEVAL_K") {
            self.retrieval.k = parse_var("RETRIEVAL_K", &v)?;
        }
        if let Some(v) = get("RELEVANCE_THRESHOLD") {
            self.retrieval.threshold = parse_var("RELEVANCE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("DEFAULT_SOURCE") {
            self.retrieval.default_source = Some(v);
        }
        if let Some(v) = get("STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = get("DATA_PATH") {
            self.data.path = PathBuf::from(v);
        }
        if let Some(v) = get("BIND_ADDR") {
            self.server.bind = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "LOG_FORMAT must be pretty or json, got '{}'",
                        other
                    ))
                    .into())
                }
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunking.chunk_size must be > 0".into()).into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::Invalid(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".into(),
            )
            .into());
        }
        if self.retrieval.k == 0 {
            return Err(ConfigError::Invalid("retrieval.k must be >= 1".into()).into());
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be > 0".into()).into());
        }
        if self.embedding.max_attempts == 0 {
            return Err(ConfigError::Invalid("embedding.max_attempts must be >= 1".into()).into());
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("{} has an invalid value: '{}'", key, value)).into()
    })
}
