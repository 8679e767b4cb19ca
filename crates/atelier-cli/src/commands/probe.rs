//! `atelier probe <backend-id>` -- open a fresh connection and report.

use clap::Args;

use super::http_router;
use crate::config::load_config;

/// Arguments for the `atelier probe` subcommand.
#[derive(Args)]
pub struct ProbeArgs {
    /// Backend id from `atelier models`.
    pub backend: String,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).await?;
    let router = http_router(&config.router);
    let report = router.probe(&args.backend).await?;

    if report.available {
        println!(
            "{}: available ({} ms)",
            args.backend,
            report.latency_ms.unwrap_or_default()
        );
    } else {
        println!(
            "{}: unavailable ({})",
            args.backend,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
