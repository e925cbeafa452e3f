//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::client::ClientConfig;
use crate::translate::QueryLanguage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub influx: ClientConfig,

    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query translator configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranslatorConfig {
    /// Language used when a command does not name one
    #[serde(default = "default_language")]
    pub default_language: QueryLanguage,

    /// Retention policy in InfluxQL `FROM` clauses
    #[serde(default = "default_retention_policy")]
    pub retention_policy: String,
}

fn default_language() -> QueryLanguage {
    QueryLanguage::Flux
}

fn default_retention_policy() -> String {
    "autogen".to_string()
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            retention_policy: default_retention_policy(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("gridlens").join("config.toml")),
            Some(PathBuf::from("/etc/gridlens/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `GRIDLENS_*` overrides from a variable lookup
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GRIDLENS_INFLUX_URL") {
            self.influx.url = url;
        }
        if let Some(token) = lookup("GRIDLENS_INFLUX_TOKEN") {
            self.influx.token = token;
        }
        if let Some(org) = lookup("GRIDLENS_INFLUX_ORG") {
            self.influx.org = org;
        }
        if let Some(bucket) = lookup("GRIDLENS_INFLUX_BUCKET") {
            self.influx.bucket = bucket;
        }

        if let Some(level) = lookup("GRIDLENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GRIDLENS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Gridlens Configuration
#
# Environment variables override these settings:
# - GRIDLENS_INFLUX_URL
# - GRIDLENS_INFLUX_TOKEN
# - GRIDLENS_INFLUX_ORG
# - GRIDLENS_INFLUX_BUCKET
# - GRIDLENS_LOG_LEVEL
# - GRIDLENS_LOG_FORMAT

[influx]
# InfluxDB base URL
url = "http://localhost:8086"

# API token (prefer GRIDLENS_INFLUX_TOKEN over storing it here)
token = ""

# Organization and default bucket
org = "gridlens"
bucket = "energy"

# Per-request timeout (ms)
timeout_ms = 10000

# Retries after the first attempt, with jittered exponential backoff
max_retries = 3
retry_base_delay_ms = 500
retry_max_delay_ms = 30000

# Points per write request
batch_size = 5000

# Concurrent in-flight requests
max_connections = 10

[translator]
# Query language when none is given: flux or influxql
default_language = "flux"

# Retention policy used in InfluxQL FROM clauses
retention_policy = "autogen"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
