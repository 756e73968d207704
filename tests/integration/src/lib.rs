//! Integration tests for the grounding gateway
//!
//! Backends are real HTTP servers on loopback ports: wiremock servers
//! standing in for API replicas, or the API router itself. Covered:
//! - Health marking, TTL recovery and one-shot failover in the proxy
//! - Session affinity and geo preference
//! - Model substitution and per-route dispatch on the API surface
//! - Provisioning and invocation against a mocked agents service

pub mod fixtures;
pub mod helpers;
pub mod mock_backends;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_backends::*;

#[cfg(test)]
mod affinity_tests;
#[cfg(test)]
mod api_tests;
#[cfg(test)]
mod failover_tests;
#[cfg(test)]
mod provider_tests;
