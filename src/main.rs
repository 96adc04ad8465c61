//! queueboard - call-center queue manager dashboard backend.
//!
//! Polls the astproxy queue manager API and serves chart-ready
//! statistics as JSON.

mod client;
mod config;
mod poller;
mod stats;
mod web;

use client::AstproxyClient;
use config::ServerConfig;
use poller::Poller;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("queueboard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting queueboard on port {}...", cfg.http_port);
    tracing::info!("Using astproxy at {}", cfg.astproxy_url);

    let client = AstproxyClient::new(
        &cfg.astproxy_url,
        cfg.auth_token.clone(),
        cfg.request_timeout(),
    )?;

    // Start polling
    let poller = Arc::new(Poller::new(Arc::new(client.clone()), cfg.poll_interval()));
    poller.start().await;

    // Start web server
    let server = Server::new(cfg, client, poller.clone());
    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    poller.stop().await;
    tracing::info!("Shut down cleanly");

    Ok(())
}
