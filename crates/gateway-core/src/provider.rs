//! Capability traits implemented by remote service clients.
//!
//! Anything that can answer a grounded query for an [`AgentHandle`] can back
//! the pool; new agent kinds only need a [`GroundingClient`] implementation.

use async_trait::async_trait;

use crate::agent::{AgentHandle, AgentSpec, RemoteAgent};
use crate::answer::AnswerResult;
use crate::error::{GatewayResult, RemoteError};

/// Executes grounded queries against a remote agent
#[async_trait]
pub trait GroundingClient: Send + Sync {
    /// Perform exactly one exchange for `query` using `handle.remote_id`.
    ///
    /// Per-call remote resources are released before this returns, whatever
    /// the outcome.
    async fn invoke(&self, handle: &AgentHandle, query: &str) -> Result<AnswerResult, RemoteError>;

    /// Client name for logs and metrics
    fn name(&self) -> &'static str;
}

/// Lists and creates remote agents while the pool is being built
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// List all agents visible to the calling identity
    async fn list_agents(&self) -> GatewayResult<Vec<RemoteAgent>>;

    /// Create an agent
    async fn create_agent(&self, spec: &AgentSpec) -> GatewayResult<RemoteAgent>;
}
