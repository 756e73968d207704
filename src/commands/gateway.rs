//! Gateway command - runs the reverse proxy across API replicas.

use anyhow::{Context, Result};
use clap::Args;
use gateway_config::{GatewayConfig, ProxyConfig};
use gateway_resilience::HealthTracker;
use gateway_routing::{AffinityConfig, BackendDescriptor, BackendSet, GeoPreferences, RoutingPolicy};
use gateway_server::{create_proxy_router, ProxyState, ReqwestUpstream, Server};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use tracing::info;

/// Arguments for the gateway command.
#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the gateway command.
pub async fn execute(args: GatewayArgs, mut config: GatewayConfig) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let policy = build_policy(&config)?;
    info!(
        backends = policy.backends().len(),
        host = %config.server.host,
        port = config.server.port,
        "Starting routing gateway"
    );

    let proxy = &config.gateway;
    let upstream = ReqwestUpstream::new(proxy.upstream_timeout)?;
    let metrics = Metrics::new().context("Failed to create metrics registry")?;
    let state = ProxyState::new(policy, Arc::new(upstream), &proxy.region_header, metrics)?;

    Server::new(&config.server)
        .run(create_proxy_router(state))
        .await
        .context("Gateway failed")
}

/// Assemble the routing policy from the `gateway` config section.
pub(crate) fn build_policy(config: &GatewayConfig) -> Result<RoutingPolicy> {
    let backends = config
        .require_backends()?
        .iter()
        .map(|b| {
            let descriptor = BackendDescriptor::new(&b.id, &b.base_url)?;
            Ok(match &b.region {
                Some(region) => descriptor.with_region(region),
                None => descriptor,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let backends = BackendSet::new(backends)?;

    let proxy: &ProxyConfig = &config.gateway;
    let geo = GeoPreferences::new(&backends, &proxy.regions);
    let affinity = AffinityConfig::new(&proxy.affinity_cookie)
        .with_ttl(proxy.affinity_ttl)
        .with_secure(proxy.secure_cookie);

    Ok(
        RoutingPolicy::new(backends, HealthTracker::in_memory(proxy.health_ttl), affinity)
            .with_geo(geo),
    )
}
