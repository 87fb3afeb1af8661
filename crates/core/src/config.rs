use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::Weights;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "SEARCHRANK_CONFIG";

/// Main configuration for the searchrank query service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with. Weights stay unchecked.
    pub fn validate(&self) -> Result<()> {
        let half_life = self.search.freshness_half_life_days;
        if !half_life.is_finite() || half_life <= 0.0 {
            return Err(Error::Config(format!(
                "search.freshness_half_life_days must be a positive number, got {half_life}"
            )));
        }
        Ok(())
    }

    /// Load from `$SEARCHRANK_CONFIG`, then ~/.config/searchrank/config.toml,
    /// falling back to defaults when neither exists.
    pub fn load_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            tracing::info!(path = %PathBuf::from(&path).display(), "Loading config from env");
            return Self::from_file(path);
        }

        let config_path = dirs_path().join("config.toml");
        if config_path.exists() {
            tracing::info!(path = %config_path.display(), "Loading config");
            Self::from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Data directory path (None keeps the lexical index in RAM)
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.index
            .data_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand(dir)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST API host
    pub host: String,
    /// REST API port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight for normalized BM25 score
    pub lexical_weight: f64,
    /// Weight for normalized vector similarity
    pub vector_weight: f64,
    /// Weight for the freshness signal
    pub freshness_weight: f64,
    /// Default number of results returned to clients
    pub default_limit: usize,
    /// Candidates fetched from each retrieval source before merging
    pub candidate_limit: usize,
    /// Deadline for a single vector retrieval attempt
    pub vector_timeout_ms: u64,
    /// Half-life used when deriving freshness from a publish timestamp
    pub freshness_half_life_days: f64,
}

impl SearchConfig {
    pub fn weights(&self) -> Weights {
        Weights {
            lexical: self.lexical_weight,
            vector: self.vector_weight,
            freshness: self.freshness_weight,
        }
    }

    pub fn vector_timeout(&self) -> Duration {
        Duration::from_millis(self.vector_timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        let weights = Weights::default();
        Self {
            lexical_weight: weights.lexical,
            vector_weight: weights.vector,
            freshness_weight: weights.freshness,
            default_limit: 10,
            candidate_limit: 50,
            vector_timeout_ms: 80,
            freshness_half_life_days: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory for the on-disk lexical index
    pub data_dir: Option<String>,
    /// Embedding dimensions accepted by the vector index
    pub dimensions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            dimensions: 64,
        }
    }
}

/// Expand ~ to home directory
fn shellexpand(path: &str) -> String {
    if path.starts_with("~/")
        && let Some(home) = home_dir()
    {
        return path.replacen("~", &home.to_string_lossy(), 1);
    }
    path.to_string()
}

/// Config directory: ~/.config/searchrank/
fn dirs_path() -> PathBuf {
    let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("searchrank");
    path
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
