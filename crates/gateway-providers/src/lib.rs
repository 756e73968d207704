//! # Gateway Providers
//!
//! Remote service clients for the grounding gateway.
//!
//! The Azure AI Agents client implements both capability traits from
//! `gateway-core`: [`GroundingClient`](gateway_core::GroundingClient) for
//! answering queries and [`AgentDirectory`](gateway_core::AgentDirectory) for
//! discovering and provisioning agents at startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod azure_agents;
pub mod citations;

pub use azure_agents::{
    AzureAgentsClient, AzureAgentsConfig, DEFAULT_API_VERSION, DEFAULT_POLL_INTERVAL,
    DEFAULT_RUN_TIMEOUT,
};
pub use citations::{resolve_citations, UrlAnnotation};
