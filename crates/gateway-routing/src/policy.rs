//! Health-aware routing across service replicas.
//!
//! Per request:
//! 1. Eligible backends are those not marked unhealthy. If none are, every
//!    configured backend is eligible again so traffic is never blocked on
//!    stale health data.
//! 2. The preference is the affinity backend if the token names an eligible
//!    one, else the geo-mapped backend if eligible, else the first eligible
//!    backend in configured order.
//! 3. The observed response (or transport failure) refreshes the backend's
//!    health mark, and the affinity token is reissued for whichever backend
//!    actually served.
//!
//! Ties are broken by configured order, never randomly, so identical input
//! and health produce identical decisions.

use gateway_resilience::{BackendHealth, HealthState, HealthTracker};
use serde::Serialize;
use tracing::{debug, info};

use crate::affinity::{AffinityConfig, AffinityState};
use crate::backend::{BackendDescriptor, BackendSet};
use crate::geo::GeoPreferences;

/// Routing inputs carried by a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteContext {
    /// Backend id from the affinity cookie
    pub affinity_token: Option<String>,
    /// Client region hint
    pub region_hint: Option<String>,
}

impl RouteContext {
    /// Context without affinity or region
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the affinity token
    #[must_use]
    pub fn with_affinity(mut self, token: impl Into<String>) -> Self {
        self.affinity_token = Some(token.into());
        self
    }

    /// Set the region hint
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region_hint = Some(region.into());
        self
    }
}

/// Why a backend was preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// Named by a valid affinity token
    Affinity,
    /// Mapped from the client's region
    Geo,
    /// First eligible backend in configured order
    ConfiguredOrder,
}

impl Preference {
    /// Label for logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affinity => "affinity",
            Self::Geo => "geo",
            Self::ConfiguredOrder => "configured_order",
        }
    }
}

/// Outcome of the routing decision for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Backend to forward to
    pub backend: BackendDescriptor,
    /// State of the request's affinity token
    pub affinity: AffinityState,
    /// Reason the backend was chosen
    pub preference: Preference,
}

/// What was observed after forwarding to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The backend answered with this status
    Status(u16),
    /// The backend could not be reached or timed out
    TransportFailure,
}

/// Routing policy over a fixed backend set
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    backends: BackendSet,
    health: HealthTracker,
    affinity: AffinityConfig,
    geo: GeoPreferences,
}

impl RoutingPolicy {
    /// Create a policy
    #[must_use]
    pub fn new(backends: BackendSet, health: HealthTracker, affinity: AffinityConfig) -> Self {
        Self {
            backends,
            health,
            affinity,
            geo: GeoPreferences::default(),
        }
    }

    /// Set geo preferences
    #[must_use]
    pub fn with_geo(mut self, geo: GeoPreferences) -> Self {
        self.geo = geo;
        self
    }

    /// Configured backends
    #[must_use]
    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Affinity settings
    #[must_use]
    pub fn affinity(&self) -> &AffinityConfig {
        &self.affinity
    }

    /// Backends eligible for selection, in configured order
    pub async fn eligible(&self) -> Vec<&BackendDescriptor> {
        self.eligible_excluding(None).await
    }

    async fn eligible_excluding(&self, exclude: Option<&str>) -> Vec<&BackendDescriptor> {
        let candidates: Vec<&BackendDescriptor> = self
            .backends
            .iter()
            .filter(|b| Some(b.id.as_str()) != exclude)
            .collect();

        let mut healthy = Vec::with_capacity(candidates.len());
        for backend in &candidates {
            if self.health.state(&backend.id).await.is_eligible() {
                healthy.push(*backend);
            }
        }

        if healthy.is_empty() {
            debug!("No backend known healthy; considering all candidates");
            candidates
        } else {
            healthy
        }
    }

    /// Choose the backend for a new request
    pub async fn decide(&self, ctx: &RouteContext) -> RouteDecision {
        match self.select(ctx, None).await {
            Some(decision) => decision,
            None => RouteDecision {
                backend: self.backends.first().clone(),
                affinity: AffinityState::NoAffinity,
                preference: Preference::ConfiguredOrder,
            },
        }
    }

    /// Choose a different backend after `failed` could not be reached.
    ///
    /// Returns `None` when `failed` is the only configured backend.
    pub async fn failover(&self, ctx: &RouteContext, failed: &str) -> Option<RouteDecision> {
        let decision = self.select(ctx, Some(failed)).await;
        if let Some(decision) = &decision {
            info!(failed = %failed, backend = %decision.backend.id, "Failing over to another backend");
        }
        decision
    }

    async fn select(&self, ctx: &RouteContext, exclude: Option<&str>) -> Option<RouteDecision> {
        let eligible = self.eligible_excluding(exclude).await;
        let first = *eligible.first()?;

        let affinity_backend = ctx
            .affinity_token
            .as_deref()
            .and_then(|token| eligible.iter().copied().find(|b| b.id == token));

        let affinity = match (&ctx.affinity_token, affinity_backend) {
            (None, _) => AffinityState::NoAffinity,
            (Some(_), Some(_)) => AffinityState::Valid,
            (Some(_), None) => AffinityState::Stale,
        };

        if let Some(backend) = affinity_backend {
            return Some(RouteDecision {
                backend: backend.clone(),
                affinity,
                preference: Preference::Affinity,
            });
        }

        if affinity == AffinityState::Stale {
            debug!(
                token = ?ctx.affinity_token,
                "Affinity token names an ineligible backend; rerouting"
            );
        }

        let geo_backend = ctx
            .region_hint
            .as_deref()
            .and_then(|region| self.geo.preferred(region))
            .and_then(|id| eligible.iter().copied().find(|b| b.id == id));

        let (backend, preference) = match geo_backend {
            Some(backend) => (backend, Preference::Geo),
            None => (first, Preference::ConfiguredOrder),
        };

        Some(RouteDecision {
            backend: backend.clone(),
            affinity,
            preference,
        })
    }

    /// Update health from what a backend returned.
    ///
    /// Returns the health state written, if any.
    pub async fn observe(&self, backend_id: &str, observation: Observation) -> Option<HealthState> {
        match observation {
            Observation::Status(status) => self.health.record_status(backend_id, status).await,
            Observation::TransportFailure => {
                self.health.record_transport_failure(backend_id).await;
                Some(HealthState::Unhealthy)
            }
        }
    }

    /// `Set-Cookie` value pinning the client to `served`
    #[must_use]
    pub fn affinity_cookie(&self, served: &BackendDescriptor) -> String {
        self.affinity.set_cookie(&served.id)
    }

    /// Health of every backend in configured order
    pub async fn snapshot(&self) -> Vec<(BackendDescriptor, BackendHealth)> {
        let mut out = Vec::with_capacity(self.backends.len());
        for backend in self.backends.iter() {
            out.push((backend.clone(), self.health.health(&backend.id).await));
        }
        out
    }
}
