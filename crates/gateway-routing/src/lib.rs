//! # Gateway Routing
//!
//! Selection logic for the grounding gateway.
//!
//! This crate provides:
//! - The agent pool: handles grouped by model with round-robin selection
//! - Agent discovery from environment variables
//! - Backend descriptors for the service replicas behind the gateway
//! - Session affinity tokens and geo preferences
//! - The routing policy that picks a replica per request and tracks its health

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod affinity;
pub mod backend;
pub mod discovery;
pub mod geo;
pub mod policy;
pub mod pool;

// Re-export main types
pub use affinity::{AffinityConfig, AffinityState, DEFAULT_AFFINITY_COOKIE, DEFAULT_AFFINITY_TTL};
pub use backend::{BackendDescriptor, BackendSet};
pub use discovery::discover_from_env;
pub use geo::GeoPreferences;
pub use policy::{Observation, Preference, RouteContext, RouteDecision, RoutingPolicy};
pub use pool::{AgentPool, Selection};
