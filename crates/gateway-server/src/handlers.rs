//! HTTP request handlers for the grounding API.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use gateway_core::{AgentHandle, AnswerResult, Citation, GatewayError, SupportedModel};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
    error::ApiError,
    extractors::{GroundingParams, RequestId},
    state::{AppState, SERVICE_NAME},
};

/// Model used when a request names none
pub const DEFAULT_REQUEST_MODEL: &str = "gpt-4o";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
    /// Number of agents in the pool
    pub agents_loaded: usize,
    /// Routes of the loaded agents
    pub agents: Vec<String>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        agents_loaded: state.pool.len(),
        agents: state.pool.list_routes(),
    })
}

/// One entry of the agent listing
#[derive(Debug, Serialize)]
pub struct AgentEntry {
    /// Path serving this agent
    pub route: String,
    /// Model name
    pub model: SupportedModel,
    /// Index within the model group
    pub index: u32,
    /// Remote agent id
    pub agent_id: String,
}

/// Agent listing response
#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    /// Number of agents
    pub total: usize,
    /// Agents in pool order
    pub agents: Vec<AgentEntry>,
}

/// List loaded agents
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let agents: Vec<AgentEntry> = state
        .pool
        .handles()
        .map(|h| AgentEntry {
            route: format!("/bing-grounding/{}", h.route),
            model: h.model,
            index: h.index,
            agent_id: h.remote_id.clone(),
        })
        .collect();

    Json(AgentsResponse {
        total: agents.len(),
        agents,
    })
}

/// Metadata describing how a grounding request was served
#[derive(Debug, Serialize)]
pub struct ResponseMetadata {
    /// Model that served the request
    pub model: SupportedModel,
    /// Model the client asked for
    pub requested_model: String,
    /// Route of the agent used
    pub agent_route: String,
    /// Whether the default model replaced the requested one
    pub model_substituted: bool,
}

/// Grounded answer response
#[derive(Debug, Serialize)]
pub struct GroundingResponse {
    /// Answer text with `[n]` citation markers
    pub content: String,
    /// Cited sources in marker order
    pub citations: Vec<Citation>,
    /// How the request was served
    pub metadata: ResponseMetadata,
}

impl GroundingResponse {
    fn new(answer: AnswerResult, handle: &AgentHandle, requested: String, substituted: bool) -> Self {
        Self {
            content: answer.content,
            citations: answer.citations,
            metadata: ResponseMetadata {
                model: handle.model,
                requested_model: requested,
                agent_route: handle.route.clone(),
                model_substituted: substituted,
            },
        }
    }
}

/// Answer a query with any agent of the requested model.
///
/// A model without agents is replaced by the default model and the
/// substitution is reported in the response metadata.
#[instrument(skip(state, params), fields(request_id = %request_id))]
pub async fn bing_grounding(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    params: GroundingParams,
) -> Result<Json<GroundingResponse>, ApiError> {
    let requested = params
        .model
        .unwrap_or_else(|| DEFAULT_REQUEST_MODEL.to_string());

    let selection = state.pool.select_or_default(&requested, state.default_model)?;
    let handle = selection.handle.clone();

    if selection.substituted {
        info!(
            requested = %requested,
            served = %handle.model,
            route = %handle.route,
            "Requested model unavailable; using default model"
        );
        let requested_label = requested
            .parse::<SupportedModel>()
            .map_or("unknown", |model| model.as_str());
        state
            .metrics
            .record_substitution(requested_label, handle.model.as_str());
    }

    let answer = invoke(&state, &handle, &params.query).await?;
    Ok(Json(GroundingResponse::new(
        answer,
        &handle,
        requested,
        selection.substituted,
    )))
}

/// Answer a query with one specific agent
#[instrument(skip(state, params), fields(request_id = %request_id))]
pub async fn bing_grounding_route(
    State(state): State<AppState>,
    Path(agent_route): Path<String>,
    RequestId(request_id): RequestId,
    params: GroundingParams,
) -> Result<Json<GroundingResponse>, ApiError> {
    let Some(handle) = state.pool.find_by_route(&agent_route).cloned() else {
        let available = state.pool.list_routes();
        return Err(ApiError::from(GatewayError::RouteNotFound {
            route: agent_route,
        })
        .with_details(serde_json::json!({ "available": available })));
    };

    let answer = invoke(&state, &handle, &params.query).await?;
    let requested = handle.model.as_str().to_string();
    Ok(Json(GroundingResponse::new(answer, &handle, requested, false)))
}

async fn invoke(state: &AppState, handle: &AgentHandle, query: &str) -> Result<AnswerResult, ApiError> {
    debug!(route = %handle.route, model = %handle.model, "Invoking agent");
    let start = Instant::now();
    let result = state.client.invoke(handle, query).await;
    state
        .metrics
        .observe_invoke(handle.model.as_str(), start.elapsed());
    result.map_err(|e| ApiError::from(GatewayError::Remote(e)))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    render_metrics(&state.metrics)
}

pub(crate) fn render_metrics(
    metrics: &gateway_telemetry::Metrics,
) -> Result<impl IntoResponse, ApiError> {
    let body = metrics
        .gather()
        .map_err(|e| ApiError::internal(format!("Failed to render metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
