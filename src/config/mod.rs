#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_SESSION_EXPIRATION_HOURS: u32 = 24;
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub analyzer: AnalyzerConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Streaming chat-completion backend (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on the duration of one generation stream, in seconds.
    /// Hitting it is treated the same as any other mid-stream fault.
    pub stream_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// External document-analysis service used by the ingestion pipeline.
/// An empty endpoint means ingestion is unavailable; chat does not need it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub expiration_hours: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            analyzer: AnalyzerConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "llama3.1:latest".to_string(),
            stream_timeout_secs: 300,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "nomic-embed-text:latest".to_string(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            model_id: String::new(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: DEFAULT_RETRIEVAL_TOP_K,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_hours: DEFAULT_SESSION_EXPIRATION_HOURS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid retrieval top_k: {0} (must be between 1 and 20)")]
    InvalidTopK(usize),
    #[error("Invalid session expiration: {0} hours (must be between 1 and 720)")]
    InvalidExpiration(u32),
    #[error("Invalid stream timeout: {0} seconds (must be between 1 and 3600)")]
    InvalidStreamTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Get the directory where configuration and databases live.
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine user config directory")?;
    Ok(base.join("askdocs"))
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.generation.endpoint)?;
        validate_endpoint(&self.embedding.endpoint)?;
        if self.analyzer.is_configured() {
            validate_endpoint(&self.analyzer.endpoint)?;
        }

        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation.model.clone()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model.clone()));
        }

        if !(1..=3600).contains(&self.generation.stream_timeout_secs) {
            return Err(ConfigError::InvalidStreamTimeout(
                self.generation.stream_timeout_secs,
            ));
        }

        if !(1..=20).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if !(1..=720).contains(&self.session.expiration_hours) {
            return Err(ConfigError::InvalidExpiration(self.session.expiration_hours));
        }

        Ok(())
    }

    /// Path for the SQLite session database.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("sessions.db")
    }

    /// Path for the LanceDB vector index directory.
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }
}

impl AnalyzerConfig {
    #[inline]
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.model_id.trim().is_empty()
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.to_string()))?;
    Ok(())
}

/// Print the active configuration to stdout.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load(get_config_dir()?)?;
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}
