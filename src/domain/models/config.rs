use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for nydus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Relation cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files (logs only to stderr when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File name used inside `log_dir`
    #[serde(default = "default_log_file")]
    pub file_name: String,

    /// Log rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

/// Console log format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// How often the log file rotates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "nydus.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            file_name: default_log_file(),
            rotation: RotationPolicy::default(),
        }
    }
}

/// Relation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Warn when a request-scope registry holds more entries than this.
    /// Entries are never expired before the scope is disposed.
    #[serde(default = "default_registry_warn_threshold")]
    pub registry_warn_threshold: usize,
}

const fn default_registry_warn_threshold() -> usize {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            registry_warn_threshold: default_registry_warn_threshold(),
        }
    }
}
