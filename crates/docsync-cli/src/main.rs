//! docsync CLI - keep repository-hosted documentation in sync with a local cache
//!
//! This is the main entry point for the docsync command-line interface.
//! Command implementations live in the `commands` module.

use anyhow::{Context, Result};
use clap::Parser;
use docsync_core::Config;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use commands::SyncOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::logging::initialize_logging(&cli)?;

    execute_command(cli).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir.clone_from(dir);
    }
    config.validate()?;
    tracing::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

async fn execute_command(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Sync {
            pages,
            languages,
            output,
            concurrency,
            format,
        } => {
            let config = load_config(&cli)?;
            let options = SyncOptions {
                pages: pages.clone(),
                languages: languages.clone(),
                output: output.clone(),
                concurrency: *concurrency,
                format: format.resolve(),
            };
            commands::sync_pages(&config, options).await?;
        },

        Commands::Parse { url, format } => {
            commands::parse_reference(url, format.resolve())?;
        },

        Commands::Clear { yes } => {
            let config = load_config(&cli)?;
            commands::clear_cache(&config.cache.dir, *yes)?;
        },
    }

    Ok(())
}
