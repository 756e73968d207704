//! Prometheus metrics.
//!
//! Each [`Metrics`] owns its registry so tests and multiple servers in one
//! process never collide on registration.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::TelemetryError;

/// Metric handles for both serving surfaces
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    invoke_duration: HistogramVec,
    substitutions: IntCounterVec,
    route_decisions: IntCounterVec,
    health_marks: IntCounterVec,
    failovers: IntCounter,
    exhausted: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register every series
    ///
    /// # Errors
    /// Returns error if a series cannot be registered
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("grounding_requests_total", "Requests handled by endpoint and status"),
            &["endpoint", "status"],
        )?;
        let invoke_duration = HistogramVec::new(
            HistogramOpts::new(
                "grounding_invoke_duration_seconds",
                "Duration of remote grounding calls",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
            &["model"],
        )?;
        let substitutions = IntCounterVec::new(
            Opts::new(
                "grounding_model_substitutions_total",
                "Requests served by the default model instead of the requested one",
            ),
            &["requested", "served"],
        )?;
        let route_decisions = IntCounterVec::new(
            Opts::new("gateway_route_decisions_total", "Routing decisions by backend and preference"),
            &["backend", "preference"],
        )?;
        let health_marks = IntCounterVec::new(
            Opts::new("gateway_backend_health_marks_total", "Health marks written per backend"),
            &["backend", "state"],
        )?;
        let failovers = IntCounter::new(
            "gateway_upstream_failovers_total",
            "Requests retried on a second backend after a transport failure",
        )?;
        let exhausted = IntCounter::new(
            "gateway_routing_exhausted_total",
            "Requests that failed on every attempted backend",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(invoke_duration.clone()))?;
        registry.register(Box::new(substitutions.clone()))?;
        registry.register(Box::new(route_decisions.clone()))?;
        registry.register(Box::new(health_marks.clone()))?;
        registry.register(Box::new(failovers.clone()))?;
        registry.register(Box::new(exhausted.clone()))?;

        Ok(Self {
            registry,
            requests,
            invoke_duration,
            substitutions,
            route_decisions,
            health_marks,
            failovers,
            exhausted,
        })
    }

    /// Underlying registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a handled request
    pub fn record_request(&self, endpoint: &str, status: u16) {
        let status = status.to_string();
        self.requests
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
    }

    /// Observe one remote call
    pub fn observe_invoke(&self, model: &str, elapsed: Duration) {
        self.invoke_duration
            .with_label_values(&[model])
            .observe(elapsed.as_secs_f64());
    }

    /// Count a default-model substitution. `requested` is a known model name or `unknown`
    pub fn record_substitution(&self, requested: &str, served: &str) {
        self.substitutions
            .with_label_values(&[requested, served])
            .inc();
    }

    /// Count a routing decision
    pub fn record_route_decision(&self, backend: &str, preference: &str) {
        self.route_decisions
            .with_label_values(&[backend, preference])
            .inc();
    }

    /// Count a health mark
    pub fn record_health_mark(&self, backend: &str, state: &str) {
        self.health_marks.with_label_values(&[backend, state]).inc();
    }

    /// Count a failover attempt
    pub fn record_failover(&self) {
        self.failovers.inc();
    }

    /// Count a request that exhausted its attempts
    pub fn record_routing_exhausted(&self) {
        self.exhausted.inc();
    }

    /// Render every series in the Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, TelemetryError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::Encode(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encode(e.to_string()))
    }
}
