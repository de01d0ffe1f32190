//! vidjoin CLI: command-line interface for merging videos.
//!
//! Usage:
//!   vidjoin merge <PATHS>...    Merge videos in order into one file
//!   vidjoin probe <PATH>        Show what vidjoin reads from a source
//!   vidjoin plan <PATHS>...     Show the composition without exporting
//!   vidjoin check               Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vidjoin_common::config::VidjoinConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidjoin",
    about = "Concatenate videos into a single file",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge videos end to end, in the order given
    Merge {
        /// Source videos or file:// URIs
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output file path (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output container: mp4, mov, m4v
        #[arg(long)]
        format: Option<String>,
    },

    /// Show the metadata vidjoin reads from a source
    Probe {
        /// Path to the source video
        path: PathBuf,
    },

    /// Build the composition for some sources and print it without exporting
    Plan {
        /// Source videos, in merge order
        #[arg(required = true)]
        paths: Vec<String>,

        /// Also print the ffmpeg command that would render it
        #[arg(long)]
        show_command: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = VidjoinConfig::load();

    vidjoin_common::logging::init_logging(&config.logging, cli.verbose);
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Merge {
            paths,
            output,
            format,
        } => commands::merge::run(config, paths, output, format).await,
        Commands::Probe { path } => commands::probe::run(&config, path).await,
        Commands::Plan {
            paths,
            show_command,
        } => commands::plan::run(&config, paths, show_command).await,
        Commands::Check => commands::check::run(&config),
    }
}
