//! epgmerge CLI - merge and normalize XMLTV program guides.
//!
//! This is the entry point for the `epgmerge` command-line interface.
//! Command implementations live in the `commands` module.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;
    execute_command(cli).await
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Merge {
            trim,
            no_gzip,
            output,
        }) => {
            commands::merge(&cli.config, trim, no_gzip, output).await?;
        },

        Some(Commands::Clear { force }) => {
            commands::clear_cache(&cli.config, force)?;
        },

        None => {
            // Running without a subcommand is a plain merge.
            commands::merge(&cli.config, false, false, None).await?;
        },
    }

    Ok(())
}
