//! Configuration module for unpackr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section has defaults,
//! so an empty file (or no file at all) is a valid configuration.
//!
//! # Example
//!
//! ```yaml
//! s3:
//!   default_region: "${AWS_REGION:-us-east-1}"
//!   endpoint: "http://localhost:9000"
//!   force_path_style: true
//! extract:
//!   multipart_threshold: 104857600
//!   part_size: 5242880
//! logging:
//!   level: debug
//! ```

use crate::upload::multipart::MIN_PART_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "UNPACKR_CONFIG";

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Load from `path` when given, else from `$UNPACKR_CONFIG`, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(path) => Self::load(path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s3.default_region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.default_region cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.s3.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid S3 endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.extract.multipart_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "extract.multipart_threshold must be greater than zero".into(),
            ));
        }

        if self.extract.part_size < MIN_PART_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "extract.part_size {} is below the S3 minimum of {} bytes",
                self.extract.part_size, MIN_PART_SIZE
            )));
        }

        if self.extract.read_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "extract.read_chunk_size must be greater than zero".into(),
            ));
        }

        if self.extract.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "extract.channel_capacity must be at least 1".into(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level '{}': must be trace, debug, info, warn, or error",
                    self.logging.level
                )))
            }
        }

        Ok(())
    }
}

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Region used when a request names none. Supports ${VAR} expansion.
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Extraction tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Declared source size above which gzip output goes through multipart upload
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
    /// Size of each multipart part (all but the last)
    #[serde(default = "default_part_size")]
    pub part_size: usize,
    /// Bytes requested from the decoder per read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Decoded items buffered between the decoder and the uploader
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            part_size: default_part_size(),
            read_chunk_size: default_read_chunk_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_multipart_threshold() -> u64 {
    104857600 // 100MB
}

fn default_part_size() -> usize {
    5242880 // 5MB
}

fn default_read_chunk_size() -> usize {
    65536 // 64KB
}

fn default_channel_capacity() -> usize {
    16
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
