//! Configuration loading.

use gateway_core::SupportedModel;
use secrecy::SecretString;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;
use crate::schema::{BackendConfig, GatewayConfig, LogFormat};

/// Load configuration from an optional file, then the process environment.
///
/// Without a path only defaults and environment variables apply.
pub async fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            let format = FileFormat::from_path(path);
            info!(path = %path.display(), ?format, "Loading configuration file");
            parse_config(&raw, format)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.check()?;
    Ok(config)
}

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl FileFormat {
    /// Pick a format from the file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// Parse a config document. Missing sections take their defaults.
pub fn parse_config(raw: &str, format: FileFormat) -> Result<GatewayConfig, ConfigError> {
    match format {
        FileFormat::Yaml => {
            if raw.trim().is_empty() {
                return Ok(GatewayConfig::default());
            }
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        FileFormat::Toml => toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Also resolves the bearer token from the variable named by
/// `agents.auth_token_env`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(host) = get("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("GATEWAY_PORT") {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "GATEWAY_PORT".to_string(),
            message: format!("'{port}' is not a port number"),
        })?;
    }
    if let Some(endpoint) = get("AZURE_AI_PROJECT_ENDPOINT") {
        config.agents.project_endpoint = Some(endpoint.trim().to_string());
    }
    if let Some(model) = get("DEFAULT_MODEL") {
        config.agents.default_model = model.trim().to_string();
    }

    for model in SupportedModel::ALL {
        let var = format!("AGENT_POOL_SIZE_{}", model.env_key());
        if let Some(raw) = get(&var) {
            let size: u32 = raw.trim().parse().map_err(|_| ConfigError::Env {
                var: var.clone(),
                message: format!("'{raw}' is not a non-negative integer"),
            })?;
            debug!(model = %model, size, "Pool size overridden from environment");
            config
                .agents
                .pool_sizes
                .insert(model.as_str().to_string(), size);
        }
    }

    if let Some(raw) = get("GATEWAY_BACKENDS") {
        config.gateway.backends = parse_backends(&raw)?;
    }

    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.logging.format = match format.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT".to_string(),
                    message: format!("unknown format '{other}' (expected json or pretty)"),
                })
            }
        };
    }

    if let Some(token) = get(&config.agents.auth_token_env) {
        config.agents.auth_token = Some(SecretString::new(token));
    }

    Ok(())
}

/// Parse `id[@region]=url` entries separated by commas
fn parse_backends(raw: &str) -> Result<Vec<BackendConfig>, ConfigError> {
    let env_error = |message: String| ConfigError::Env {
        var: "GATEWAY_BACKENDS".to_string(),
        message,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| env_error(format!("entry '{entry}' is not id[@region]=url")))?;
            let (id, region) = match name.split_once('@') {
                Some((id, region)) => (id.trim(), Some(region.trim().to_string())),
                None => (name.trim(), None),
            };
            let url = url.trim();
            Url::parse(url).map_err(|e| env_error(format!("backend '{id}': {e}")))?;
            Ok(BackendConfig {
                id: id.to_string(),
                base_url: url.to_string(),
                region: region.filter(|r| !r.is_empty()),
            })
        })
        .collect()
}
