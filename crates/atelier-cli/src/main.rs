//! `atelier` -- CLI binary for the atelier generation router.
//!
//! Provides the following subcommands:
//!
//! - `atelier serve` -- Start the HTTP API.
//! - `atelier models` -- List registered backends.
//! - `atelier probe` -- Open a fresh connection to one backend.

use clap::{Parser, Subcommand};

mod commands;
mod config;

/// atelier multi-provider generation router.
#[derive(Parser)]
#[command(name = "atelier", about = "Multi-provider AI generation router", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve(commands::serve::ServeArgs),

    /// List registered backends.
    Models(commands::models::ModelsArgs),

    /// Check that a backend can be reached.
    Probe(commands::probe::ProbeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await?,
        Commands::Models(args) => commands::models::run(args).await?,
        Commands::Probe(args) => commands::probe::run(args).await?,
    }

    Ok(())
}
