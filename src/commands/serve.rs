//! Serve command - runs one grounding API replica.

use anyhow::{Context, Result};
use clap::Args;
use gateway_config::GatewayConfig;
use gateway_server::{create_router, AppState, Server};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: GatewayConfig) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting grounding API"
    );

    let client = super::agents_client(&config)?;
    let pool = super::load_pool(&config, Some(&client)).await?;
    if pool.is_empty() {
        warn!("Agent pool is empty; grounding requests will fail with 503");
    }

    let state = AppState::builder()
        .pool(pool)
        .client(Arc::new(client))
        .default_model(config.default_model()?)
        .metrics(Metrics::new().context("Failed to create metrics registry")?)
        .build()?;

    Server::new(&config.server)
        .run(create_router(state))
        .await
        .context("Server failed")
}
