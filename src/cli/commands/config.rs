//! Implementation of the `nydus config` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Effective configuration, as printed by `nydus config`.
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    #[serde(flatten)]
    pub config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config)
            .unwrap_or_default()
            .trim_end()
            .to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Print the effective configuration.
pub fn execute(config: Config, json_mode: bool) -> Result<()> {
    output(&ConfigOutput { config }, json_mode);
    Ok(())
}
