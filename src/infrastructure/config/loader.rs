use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Log file name cannot be empty")]
    EmptyLogFileName,

    #[error("Invalid registry_warn_threshold: {0}. Must be at least 1")]
    InvalidRegistryThreshold(usize),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .nydus/config.yaml (project config)
    /// 3. .nydus/local.yaml (local overrides, optional)
    /// 4. Environment variables (NYDUS_* prefix, `__` between sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".nydus/config.yaml"))
            .merge(Yaml::file(".nydus/local.yaml"))
            .merge(Env::prefixed("NYDUS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.logging.file_name.trim().is_empty() {
            return Err(ConfigError::EmptyLogFileName);
        }

        if config.cache.registry_warn_threshold == 0 {
            return Err(ConfigError::InvalidRegistryThreshold(
                config.cache.registry_warn_threshold,
            ));
        }

        Ok(())
    }
}
