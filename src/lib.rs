#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
mod commands;
pub mod domain;
mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use app::AppController;

/// Bounded transcription job runner with a content-addressed result cache.
#[derive(Parser, Debug)]
#[command(name = "scribed", version, about, long_about = None)]
struct Cli {
    /// Directory for config, database and logs (defaults to the OS app data dir)
    #[arg(long, global = true, env = "SCRIBED_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe media files, reusing cached results for known content
    Transcribe {
        /// Audio or video files to transcribe
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Evict stale cache entries and old job records once
    Sweep,

    /// Show job, cache and pool statistics
    Stats {
        /// Only count jobs created in the last N days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Show config, data, log and database locations
    Paths,
}

/// Parse the command line and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let controller = AppController::new(cli.data_dir)
        .await
        .context("Failed to initialize scribed")?;

    let outcome = match cli.command {
        Command::Transcribe { files } => commands::transcribe(&controller, &files).await,
        Command::Sweep => commands::sweep(&controller).await,
        Command::Stats { days } => commands::stats(&controller, days).await,
        Command::Paths => commands::paths(&controller),
    };

    controller.shutdown().await;
    outcome
}
