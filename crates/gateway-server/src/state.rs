//! Shared state for the API surface.

use gateway_core::{GatewayError, GatewayResult, GroundingClient, SupportedModel};
use gateway_routing::AgentPool;
use gateway_telemetry::Metrics;
use std::sync::Arc;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "bing-grounding-api";

/// State shared by the API handlers
#[derive(Clone)]
pub struct AppState {
    /// Agent pool, read-only after startup
    pub pool: Arc<AgentPool>,
    /// Remote invocation client
    pub client: Arc<dyn GroundingClient>,
    /// Model substituted when the requested one has no agents
    pub default_model: SupportedModel,
    /// Metrics registry
    pub metrics: Metrics,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("agents", &self.pool.len())
            .field("client", &self.client.name())
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create a state builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    pool: Option<AgentPool>,
    client: Option<Arc<dyn GroundingClient>>,
    default_model: Option<SupportedModel>,
    metrics: Option<Metrics>,
}

impl AppStateBuilder {
    /// Set the agent pool
    #[must_use]
    pub fn pool(mut self, pool: AgentPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the remote client
    #[must_use]
    pub fn client(mut self, client: Arc<dyn GroundingClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the default model (`gpt-4o` if unset)
    #[must_use]
    pub fn default_model(mut self, model: SupportedModel) -> Self {
        self.default_model = Some(model);
        self
    }

    /// Share an existing metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns a configuration error when no client was set or metrics cannot be created
    pub fn build(self) -> GatewayResult<AppState> {
        let client = self
            .client
            .ok_or_else(|| GatewayError::configuration("AppState requires a grounding client"))?;
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new().map_err(|e| GatewayError::internal(e.to_string()))?,
        };

        Ok(AppState {
            pool: Arc::new(self.pool.unwrap_or_default()),
            client,
            default_model: self.default_model.unwrap_or(SupportedModel::Gpt4o),
            metrics,
        })
    }
}
