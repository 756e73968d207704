//! Provision command - creates or reuses the configured agents.

use anyhow::Result;
use gateway_config::GatewayConfig;
use gateway_core::AgentHandle;
use gateway_routing::AgentPool;

/// Execute the provision command.
///
/// Prints one `AZURE_AI_AGENT_<KEY>_<N>=<id>` line per agent, ready to be
/// sourced by replicas running in environment discovery mode.
pub async fn execute(config: &GatewayConfig) -> Result<()> {
    let client = super::agents_client(config)?;
    let pool = super::provision_pool(config, &client).await?;
    for line in assignments(&pool) {
        println!("{line}");
    }
    Ok(())
}

fn assignment(handle: &AgentHandle) -> String {
    format!(
        "AZURE_AI_AGENT_{}_{}={}",
        handle.model.env_key(),
        handle.index,
        handle.remote_id
    )
}

fn assignments(pool: &AgentPool) -> Vec<String> {
    pool.handles().map(assignment).collect()
}
