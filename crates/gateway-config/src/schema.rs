//! Configuration schema and defaults.

use gateway_core::SupportedModel;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use validator::Validate;

use crate::error::ConfigError;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    #[validate(nested)]
    pub server: ServerConfig,
    /// Agent pool and remote service
    #[validate(nested)]
    pub agents: AgentsConfig,
    /// Reverse-proxy routing
    #[validate(nested)]
    pub gateway: ProxyConfig,
    /// Log output
    pub logging: LoggingSection,
}

impl GatewayConfig {
    /// Run schema rules and cross-field checks.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        self.default_model()?;
        self.pool_sizes()?;

        let mut ids = HashSet::new();
        for backend in &self.gateway.backends {
            if !ids.insert(backend.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate backend id '{}'",
                    backend.id
                )));
            }
        }
        for (region, id) in &self.gateway.regions {
            if !ids.contains(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "region '{region}' maps to unknown backend '{id}'"
                )));
            }
        }

        for (name, value) in [
            ("gateway.health_ttl", self.gateway.health_ttl),
            ("gateway.affinity_ttl", self.gateway.affinity_ttl),
            ("gateway.upstream_timeout", self.gateway.upstream_timeout),
            ("agents.run_timeout", self.agents.run_timeout),
            ("agents.poll_interval", self.agents.poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
            }
        }

        if !self.gateway.backends.is_empty() {
            self.check_timeout_budget()?;
        }

        Ok(())
    }

    /// A forwarded request, its one failover attempt, and both health
    /// updates must all finish inside the whole-request timeout.
    ///
    /// # Errors
    /// Returns a validation error when two upstream attempts do not fit.
    pub fn check_timeout_budget(&self) -> Result<(), ConfigError> {
        let upstream = self.gateway.upstream_timeout;
        let request = self.server.request_timeout;
        if upstream.saturating_mul(2) >= request {
            return Err(ConfigError::Validation(format!(
                "gateway.upstream_timeout ({upstream:?}) must be less than half of \
                 server.request_timeout ({request:?})"
            )));
        }
        Ok(())
    }

    /// The model substituted when a requested model has no agents
    ///
    /// # Errors
    /// Returns a validation error if the name is not a supported model.
    pub fn default_model(&self) -> Result<SupportedModel, ConfigError> {
        self.agents
            .default_model
            .parse()
            .map_err(|e: gateway_core::GatewayError| ConfigError::Validation(e.to_string()))
    }

    /// Desired pool sizes keyed by supported model
    ///
    /// # Errors
    /// Returns a validation error for any unsupported model name.
    pub fn pool_sizes(&self) -> Result<BTreeMap<SupportedModel, u32>, ConfigError> {
        self.agents
            .pool_sizes
            .iter()
            .map(|(name, &count)| {
                name.parse::<SupportedModel>()
                    .map(|model| (model, count))
                    .map_err(|e| ConfigError::Validation(e.to_string()))
            })
            .collect()
    }

    /// Backends for gateway mode, which needs at least one
    ///
    /// # Errors
    /// Returns a validation error when no backend is configured.
    pub fn require_backends(&self) -> Result<&[BackendConfig], ConfigError> {
        if self.gateway.backends.is_empty() {
            return Err(ConfigError::Validation(
                "gateway mode requires at least one entry in gateway.backends".to_string(),
            ));
        }
        self.check_timeout_budget()?;
        Ok(&self.gateway.backends)
    }

    /// Project endpoint for the remote agent service
    ///
    /// # Errors
    /// Returns a validation error when no endpoint is configured.
    pub fn require_project_endpoint(&self) -> Result<&str, ConfigError> {
        self.agents
            .project_endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "agents.project_endpoint (or AZURE_AI_PROJECT_ENDPOINT) is required".to_string(),
                )
            })
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Whole-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Where agent handles come from at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Read `AZURE_AI_AGENT_<KEY>_<N>` variables
    #[default]
    Env,
    /// List remote agents and create missing ones
    Provision,
}

/// Agent pool and remote service configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct AgentsConfig {
    /// Project endpoint of the agent service
    pub project_endpoint: Option<String>,
    /// REST API version
    #[validate(length(min = 1))]
    pub api_version: String,
    /// Environment variable holding the bearer token
    #[validate(length(min = 1))]
    pub auth_token_env: String,
    /// Resolved bearer token
    #[serde(skip)]
    pub auth_token: Option<SecretString>,
    /// Handle source
    pub discovery: DiscoveryMode,
    /// Model substituted for empty groups
    pub default_model: String,
    /// Desired agents per model
    pub pool_sizes: BTreeMap<String, u32>,
    /// Limit for one complete remote exchange
    #[serde(with = "humantime_serde")]
    pub run_timeout: Duration,
    /// Delay between run status polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Instructions given to provisioned agents
    pub instructions: String,
    /// Bing connection attached to provisioned agents
    pub bing_connection_id: Option<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            project_endpoint: None,
            api_version: "2025-05-01".to_string(),
            auth_token_env: "AZURE_AI_AGENTS_TOKEN".to_string(),
            auth_token: None,
            discovery: DiscoveryMode::Env,
            default_model: SupportedModel::Gpt4o.as_str().to_string(),
            pool_sizes: BTreeMap::from([
                (SupportedModel::Gpt4o.as_str().to_string(), 12),
                (SupportedModel::Gpt4.as_str().to_string(), 0),
                (SupportedModel::Gpt35Turbo.as_str().to_string(), 0),
            ]),
            run_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            instructions: "You are a helpful assistant with access to Bing Search. Use Bing Search \
                to provide accurate, up-to-date information with citations."
                .to_string(),
            bing_connection_id: None,
        }
    }
}

/// One backend replica
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct BackendConfig {
    /// Stable id
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    /// Base URL
    #[validate(url)]
    pub base_url: String,
    /// Region served
    #[serde(default)]
    pub region: Option<String>,
}

/// Reverse-proxy routing configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ProxyConfig {
    /// Backends in tie-break order
    #[validate(nested)]
    pub backends: Vec<BackendConfig>,
    /// Lifetime of a health mark
    #[serde(with = "humantime_serde")]
    pub health_ttl: Duration,
    /// Lifetime of an affinity token
    #[serde(with = "humantime_serde")]
    pub affinity_ttl: Duration,
    /// Affinity cookie name
    #[validate(length(min = 1))]
    pub affinity_cookie: String,
    /// Whether the affinity cookie is `Secure`
    pub secure_cookie: bool,
    /// Header carrying the client region hint
    #[validate(length(min = 1))]
    pub region_header: String,
    /// Region hint to backend id overrides
    pub regions: HashMap<String, String>,
    /// Limit for one forwarded request; two must fit in `server.request_timeout`
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            health_ttl: Duration::from_secs(30),
            affinity_ttl: Duration::from_secs(24 * 60 * 60),
            affinity_cookie: "grounding_backend".to_string(),
            secure_cookie: true,
            region_header: "x-client-region".to_string(),
            regions: HashMap::new(),
            upstream_timeout: Duration::from_secs(50),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
