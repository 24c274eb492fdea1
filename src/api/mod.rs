pub mod routes;

use crate::config::Config;
use crate::service::JournalService;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run_server(config: Arc<Config>, service: Arc<JournalService>) -> Result<()> {
    let addr = SocketAddr::from((config.api_host, config.api_port));
    let state = routes::ApiState { config, service };
    let app: Router = routes::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "Child Journal API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
