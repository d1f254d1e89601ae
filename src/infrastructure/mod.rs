//! Infrastructure layer module
//!
//! Configuration loading and logging setup for the binary.

pub mod config;
pub mod logging;
