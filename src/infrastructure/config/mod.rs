//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: YAML files, then environment
//! variable overrides, then validation.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
