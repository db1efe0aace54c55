//! gym-sync proxy entry point.
//!
//! Boots the offline worker in front of the configured origin and serves it
//! over HTTP. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use gym_sync_core::{AppConfig, CacheDb};
use gym_sync_worker::{FetchClient, FetchConfig, Registration};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, listen = %config.listen_addr, "starting gym-sync proxy");

    let cache = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let listen_addr = config.listen_addr.clone();
    let max_body = config.max_bytes;

    let registration = Registration::register(config, cache, network).await?;
    let app = handler::router(registration, max_body);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
