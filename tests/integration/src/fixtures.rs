//! Shared test fixtures: a canned grounding client and API routers

use async_trait::async_trait;
use axum::Router;
use gateway_core::{AgentHandle, AnswerResult, Citation, GroundingClient, RemoteError, SupportedModel};
use gateway_routing::AgentPool;
use gateway_server::{create_router, AppState};
use std::sync::Arc;

/// Answers every query, naming the agent route that handled it
#[derive(Debug, Default)]
pub struct CannedClient;

#[async_trait]
impl GroundingClient for CannedClient {
    async fn invoke(&self, handle: &AgentHandle, query: &str) -> Result<AnswerResult, RemoteError> {
        Ok(AnswerResult {
            content: format!("{query} via {}[1]", handle.route),
            citations: vec![Citation {
                url: "https://learn.microsoft.com".to_string(),
                title: "Microsoft Learn".to_string(),
            }],
        })
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

/// Pool of `count` agents per listed model
pub fn pool_of(sizes: &[(SupportedModel, u32)]) -> AgentPool {
    let handles = sizes.iter().flat_map(|&(model, count)| {
        (1..=count).map(move |index| AgentHandle::new(model, index, format!("asst_{}", model.route(index))))
    });
    AgentPool::from_handles(handles).expect("Invalid pool")
}

/// API router over a pool with the canned client
pub fn api_router(pool: AgentPool) -> Router {
    api_router_with(pool, Arc::new(CannedClient))
}

/// API router over a pool with any client
pub fn api_router_with(pool: AgentPool, client: Arc<dyn GroundingClient>) -> Router {
    let state = AppState::builder()
        .pool(pool)
        .client(client)
        .default_model(SupportedModel::Gpt4o)
        .build()
        .expect("Invalid app state");
    create_router(state)
}
