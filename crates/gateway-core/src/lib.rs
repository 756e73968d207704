//! # Gateway Core
//!
//! Core types, traits, and error handling for the grounding gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Supported model enumeration and agent handles
//! - Grounded answer and citation types
//! - Capability traits for remote invocation and agent provisioning
//! - Error taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod answer;
pub mod error;
pub mod model;
pub mod provider;

// Re-export commonly used types
pub use agent::{AgentHandle, AgentSpec, RemoteAgent};
pub use answer::{AnswerResult, Citation};
pub use error::{GatewayError, GatewayResult, RemoteError};
pub use model::SupportedModel;
pub use provider::{AgentDirectory, GroundingClient};
