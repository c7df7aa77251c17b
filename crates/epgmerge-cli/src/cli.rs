//! CLI structure and argument parsing.
//!
//! The CLI follows a command-subcommand pattern with clap derive macros.
//! Running `epgmerge` with no subcommand performs a merge, matching how
//! the tool is typically driven from a scheduler:
//!
//! ```bash
//! # Merge using ./epgmerge.toml
//! epgmerge
//!
//! # Explicit merge with overrides
//! epgmerge merge --config /etc/epgmerge.toml --trim --no-gzip
//!
//! # Drop all cached source artifacts
//! epgmerge clear --force
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for the `epgmerge` command.
#[derive(Parser, Debug)]
#[command(name = "epgmerge")]
#[command(version)]
#[command(about = "epgmerge - Merge and normalize XMLTV program guides", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the TOML configuration file. Also via `EPGMERGE_CONFIG`.
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "EPGMERGE_CONFIG",
        default_value = "epgmerge.toml"
    )]
    pub config: PathBuf,

    /// Enable verbose logging output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show warnings and errors)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// Available subcommands for the `epgmerge` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge all configured sources into one normalized guide
    Merge {
        /// Drop programmes that already ended at ingest time
        #[arg(long)]
        trim: bool,

        /// Write the output uncompressed
        #[arg(long = "no-gzip")]
        no_gzip: bool,

        /// Override the output directory from the configuration
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Remove cached source artifacts
    Clear {
        /// Delete without confirmation
        #[arg(short = 'f', long)]
        force: bool,
    },
}
