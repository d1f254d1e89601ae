//! nydus CLI entry point.

use anyhow::Result;
use clap::Parser;

use nydus::cli::{commands, handle_error, Cli, Commands};
use nydus::infrastructure::config::ConfigLoader;
use nydus::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;

    match cli.command {
        Commands::Config => commands::config::execute(config, cli.json),
        Commands::Simulate(args) => commands::simulate::execute(args, &config.cache, cli.json).await,
    }
}
