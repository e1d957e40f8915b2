use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::ipfs::IpfsStore;
use crate::modules::transcode::probe::FfprobeProbe;
use crate::state::AppState;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;

    let scratch_dir = config.scratch_dir();
    tokio::fs::create_dir_all(&scratch_dir)
        .await
        .with_context(|| format!("failed to create scratch directory {}", scratch_dir.display()))?;

    let storage = IpfsStore::new(&config.ipfs_api_url, config.ipfs_pin, config.ipfs_cid_version)
        .context("invalid IPFS API URL")?;
    info!("📦 Content store at {}", config.ipfs_api_url);

    let probe = FfprobeProbe::new(config.ffprobe_path.clone());

    let port = config.server_port;
    let state = AppState::new(config, Arc::new(storage), Arc::new(probe));
    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
