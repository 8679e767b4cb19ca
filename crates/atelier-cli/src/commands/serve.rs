//! `atelier serve` -- run the HTTP API until Ctrl+C.
//!
//! # Example
//!
//! ```text
//! atelier serve
//! atelier serve --host 0.0.0.0 --port 8080
//! atelier serve --config /path/to/config.json
//! ```

use clap::Args;
use tracing::info;

use atelier_api::{AppState, build_router, handlers::system::mark_started};

use super::http_router;
use crate::config::load_config;

/// Arguments for the `atelier serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).await?;
    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);

    let router = http_router(&config.router);
    let backends = router.registry().len();
    let app = build_router(AppState::new(router), &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {host}:{port}: {e}"))?;
    mark_started();
    info!(%host, port, backends, "atelier API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
