//! Passive backend health tracking.
//!
//! Health is derived purely from observed responses. A mark lives for a fixed
//! TTL (30 seconds by default); when it expires the backend reads as
//! `Unknown` again, which is eligible for selection. There is no probe loop:
//! recovery is driven by time alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ttl_cache::{MemoryTtlCache, TtlCache};

/// Default lifetime of a health mark
pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(30);

/// Derived health of one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Last observed response succeeded
    Healthy,
    /// Last observed response failed
    Unhealthy,
    /// No live observation
    Unknown,
}

impl HealthState {
    /// Whether the backend may be selected.
    ///
    /// `Unknown` is treated the same as `Healthy`.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }

    /// Health implied by an HTTP status, if it implies one.
    ///
    /// 2xx is healthy; 5xx, 429, 401 and 403 are unhealthy; anything else
    /// carries no health signal.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => Some(Self::Healthy),
            401 | 403 | 429 | 500..=599 => Some(Self::Unhealthy),
            _ => None,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthRecord {
    state: HealthState,
    updated_at: DateTime<Utc>,
}

/// Snapshot of a backend's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    /// Backend id
    pub backend_id: String,
    /// Current derived state
    pub state: HealthState,
    /// When the live mark was written, if there is one
    pub last_updated: Option<DateTime<Utc>>,
}

/// Tracks backend health in a shared TTL cache
#[derive(Clone)]
pub struct HealthTracker {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
    key_prefix: String,
}

impl fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthTracker")
            .field("cache", &self.cache.name())
            .field("ttl", &self.ttl)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl HealthTracker {
    /// Create a tracker over an existing cache
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            key_prefix: "health".to_string(),
        }
    }

    /// Create a tracker with its own in-memory cache
    #[must_use]
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryTtlCache::new()), ttl)
    }

    /// Lifetime of a mark
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, backend_id: &str) -> String {
        format!("{}:{backend_id}", self.key_prefix)
    }

    /// Current health of a backend.
    ///
    /// Cache failures read as `Unknown` so stale health data never blocks traffic.
    pub async fn health(&self, backend_id: &str) -> BackendHealth {
        let record = match self.cache.get(&self.key(backend_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<HealthRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(backend = %backend_id, error = %e, "Discarding unreadable health record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(backend = %backend_id, error = %e, "Health cache read failed");
                None
            }
        };

        match record {
            Some(record) => BackendHealth {
                backend_id: backend_id.to_string(),
                state: record.state,
                last_updated: Some(record.updated_at),
            },
            None => BackendHealth {
                backend_id: backend_id.to_string(),
                state: HealthState::Unknown,
                last_updated: None,
            },
        }
    }

    /// Current derived state of a backend
    pub async fn state(&self, backend_id: &str) -> HealthState {
        self.health(backend_id).await.state
    }

    /// Mark a backend healthy for one TTL
    pub async fn mark_healthy(&self, backend_id: &str) {
        self.mark(backend_id, HealthState::Healthy).await;
    }

    /// Mark a backend unhealthy for one TTL
    pub async fn mark_unhealthy(&self, backend_id: &str) {
        self.mark(backend_id, HealthState::Unhealthy).await;
    }

    /// Apply the health signal carried by a response status.
    ///
    /// Returns the state written, or `None` if the status carries no signal.
    pub async fn record_status(&self, backend_id: &str, status: u16) -> Option<HealthState> {
        let state = HealthState::from_status(status)?;
        self.mark(backend_id, state).await;
        Some(state)
    }

    /// A backend that could not be reached counts as a server error
    pub async fn record_transport_failure(&self, backend_id: &str) {
        self.mark(backend_id, HealthState::Unhealthy).await;
    }

    async fn mark(&self, backend_id: &str, state: HealthState) {
        let previous = self.state(backend_id).await;
        let record = HealthRecord {
            state,
            updated_at: Utc::now(),
        };

        let raw = match serde_json::to_string(&record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(backend = %backend_id, error = %e, "Failed to encode health record");
                return;
            }
        };

        if let Err(e) = self.cache.set(&self.key(backend_id), raw, self.ttl).await {
            warn!(backend = %backend_id, error = %e, "Health cache write failed");
            return;
        }

        match (previous, state) {
            (HealthState::Unhealthy, HealthState::Unhealthy) => {
                debug!(backend = %backend_id, "Unhealthy mark refreshed");
            }
            (_, HealthState::Unhealthy) => {
                warn!(
                    backend = %backend_id,
                    ttl_secs = self.ttl.as_secs(),
                    "Backend marked unhealthy"
                );
            }
            (HealthState::Unhealthy, HealthState::Healthy) => {
                info!(backend = %backend_id, "Backend recovered");
            }
            _ => {
                debug!(backend = %backend_id, state = %state, "Backend health refreshed");
            }
        }
    }
}
