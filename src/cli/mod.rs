//! Command-line interface for nydus.

pub mod commands;
pub mod fixture;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::simulate::SimulateArgs;

#[derive(Parser, Debug)]
#[command(name = "nydus")]
#[command(about = "Relation resolution and request-scoped caching for repositories", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .nydus/
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration
    Config,

    /// Resolve purchase -> book relations over a fixture and report fetches
    Simulate(SimulateArgs),
}

/// Print `err` in the selected output mode and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
