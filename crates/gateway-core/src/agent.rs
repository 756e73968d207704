//! Agent handle types.

use serde::{Deserialize, Serialize};

use crate::model::SupportedModel;

/// One callable backend agent.
///
/// Handles are created while the pool is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandle {
    /// Model the agent runs on
    pub model: SupportedModel,
    /// 1-based index within the model group
    pub index: u32,
    /// Route name, unique within a pool (e.g. `gpt4o_1`)
    pub route: String,
    /// Opaque id issued by the remote service
    pub remote_id: String,
}

impl AgentHandle {
    /// Create a handle; the route is derived from model and index
    pub fn new(model: SupportedModel, index: u32, remote_id: impl Into<String>) -> Self {
        Self {
            model,
            index,
            route: model.route(index),
            remote_id: remote_id.into(),
        }
    }
}

/// An agent as listed by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAgent {
    /// Remote id
    pub id: String,
    /// Agent name, if any
    #[serde(default)]
    pub name: Option<String>,
    /// Model deployment name
    #[serde(default)]
    pub model: Option<String>,
}

/// Parameters for creating a remote agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    /// Model to deploy on
    pub model: SupportedModel,
    /// Agent name (`agent_bing_<key>_<n>`)
    pub name: String,
    /// System instructions
    pub instructions: String,
}

impl AgentSpec {
    /// Spec for the agent at `index` in the model's group
    pub fn for_index(model: SupportedModel, index: u32, instructions: impl Into<String>) -> Self {
        Self {
            model,
            name: model.agent_name(index),
            instructions: instructions.into(),
        }
    }
}
