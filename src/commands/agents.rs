//! Agents command - prints the pool a replica would load.

use anyhow::Result;
use gateway_config::GatewayConfig;

/// Execute the agents command.
pub async fn execute(config: &GatewayConfig) -> Result<()> {
    let pool = super::load_pool(config, None).await?;
    if pool.is_empty() {
        println!("No agents configured");
        return Ok(());
    }

    println!("{:<16} {:<14} {}", "ROUTE", "MODEL", "AGENT ID");
    for handle in pool.handles() {
        println!(
            "{:<16} {:<14} {}",
            format!("/bing-grounding/{}", handle.route),
            handle.model.as_str(),
            handle.remote_id
        );
    }
    Ok(())
}
