//! # alumnet-server
//!
//! Serves the files the local backend stores, so the URLs it hands out for
//! avatars and cover images resolve:
//! - `GET /health` and `GET /info`
//! - `GET /storage/:bucket/*path` straight from the shared data directory

mod api;
mod config;
mod error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,alumnet_server=debug")),
        )
        .init();

    info!("Starting Alumnet storage server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    let http_addr = config.http_addr;
    let state = AppState::new(config);
    info!(root = %state.storage.root().display(), "Serving storage");

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
