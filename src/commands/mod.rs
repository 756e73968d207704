//! Command implementations.

pub mod agents;
pub mod gateway;
pub mod provision;
pub mod serve;

use anyhow::{Context, Result};
use gateway_config::{DiscoveryMode, GatewayConfig};
use gateway_providers::{AzureAgentsClient, AzureAgentsConfig};
use gateway_routing::{discover_from_env, AgentPool};
use tracing::info;

/// Build the remote agents client from configuration.
pub(crate) fn agents_client(config: &GatewayConfig) -> Result<AzureAgentsClient> {
    let agents = &config.agents;
    let endpoint = config.require_project_endpoint()?;
    let token = agents.auth_token.clone().with_context(|| {
        format!(
            "No credential for the agents API; set {}",
            agents.auth_token_env
        )
    })?;

    let mut client_config = AzureAgentsConfig::new(endpoint, token)
        .with_api_version(&agents.api_version)
        .with_run_timeout(agents.run_timeout)
        .with_poll_interval(agents.poll_interval);
    if let Some(connection) = &agents.bing_connection_id {
        client_config = client_config.with_bing_connection(connection);
    }

    Ok(AzureAgentsClient::new(client_config)?)
}

/// Provision the configured pool through the remote directory.
pub(crate) async fn provision_pool(
    config: &GatewayConfig,
    client: &AzureAgentsClient,
) -> Result<AgentPool> {
    let pool = AgentPool::initialize(&config.agents.pool_sizes, client, &config.agents.instructions)
        .await
        .context("Failed to provision agent pool")?;
    Ok(pool)
}

/// Load the pool the way the configured discovery mode asks for.
pub(crate) async fn load_pool(
    config: &GatewayConfig,
    client: Option<&AzureAgentsClient>,
) -> Result<AgentPool> {
    match config.agents.discovery {
        DiscoveryMode::Env => {
            let handles = discover_from_env(std::env::vars());
            let pool = AgentPool::from_handles(handles)?;
            info!(agents = pool.len(), "Discovered agents from environment");
            Ok(pool)
        }
        DiscoveryMode::Provision => match client {
            Some(client) => provision_pool(config, client).await,
            None => provision_pool(config, &agents_client(config)?).await,
        },
    }
}
