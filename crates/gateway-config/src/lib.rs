//! # Gateway Config
//!
//! Configuration for the grounding gateway, read once at startup.
//!
//! Sources, in increasing precedence:
//! - Built-in defaults
//! - A YAML or TOML file
//! - Environment variables
//!
//! The result is validated before use; any failure is fatal at startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, parse_config, FileFormat};
pub use schema::{
    AgentsConfig, BackendConfig, DiscoveryMode, GatewayConfig, LogFormat, LoggingSection,
    ProxyConfig, ServerConfig,
};
