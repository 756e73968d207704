//! CLI argument definitions using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gateway_config::{load_config, GatewayConfig, LogFormat};
use gateway_telemetry::{init_logging, LogOutput, LoggingConfig};
use std::path::PathBuf;

use crate::commands;

/// Agent-pool routing and failover gateway for Bing-grounded answers
#[derive(Parser, Debug)]
#[command(name = "bing-grounding-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the grounding API from the agent pool
    #[command(visible_alias = "run")]
    Serve(commands::serve::ServeArgs),

    /// Run the reverse proxy that routes across API replicas
    Gateway(commands::gateway::GatewayArgs),

    /// Create or reuse remote agents and print their assignments
    Provision,

    /// Print the agent pool a replica would load
    Agents,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())
            .await
            .context("Failed to load configuration")?;

        let logging = logging_config(&config, self.verbose, self.json);
        if let Err(e) = init_logging(&logging) {
            eprintln!("Failed to initialize logging: {e}");
        }

        match self.command {
            Commands::Serve(args) => commands::serve::execute(args, config).await,
            Commands::Gateway(args) => commands::gateway::execute(args, config).await,
            Commands::Provision => commands::provision::execute(&config).await,
            Commands::Agents => commands::agents::execute(&config).await,
        }
    }
}

/// Merge the config file's logging section with command-line flags.
fn logging_config(config: &GatewayConfig, verbose: u8, json: bool) -> LoggingConfig {
    let level = match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let output = if json || config.logging.format == LogFormat::Json {
        LogOutput::Json
    } else {
        LogOutput::Pretty
    };

    LoggingConfig::new(env!("CARGO_PKG_NAME"))
        .with_level(level)
        .with_output(output)
}
