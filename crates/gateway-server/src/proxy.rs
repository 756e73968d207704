//! Reverse proxy executing the routing policy.
//!
//! Each inbound request is decided once, forwarded, and the backend's answer
//! is observed before the response is returned, so health updates always
//! follow their triggering response. A transport failure fails over to one
//! different backend; there is no second retry.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::GatewayError;
use gateway_routing::{BackendDescriptor, Observation, RouteContext, RoutingPolicy};
use gateway_telemetry::Metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::ApiError;

/// Backend chosen before forwarding; also sent upstream
pub const PREFERRED_BACKEND_HEADER: &str = "x-backend-preferred";

/// Backend that produced the response
pub const SERVED_BACKEND_HEADER: &str = "x-backend-served";

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Request as forwarded to a backend
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    /// Method
    pub method: Method,
    /// Path and query of the inbound request
    pub path_and_query: String,
    /// Headers, hop-by-hop headers removed
    pub headers: HeaderMap,
    /// Buffered body
    pub body: Bytes,
}

/// Response received from a backend
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    /// Status
    pub status: StatusCode,
    /// Headers
    pub headers: HeaderMap,
    /// Buffered body
    pub body: Bytes,
}

/// A backend could not produce a response
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, reset, or failed mid-response
    #[error("Connection to backend '{backend}' failed: {message}")]
    Connect {
        /// Backend id
        backend: String,
        /// Transport error
        message: String,
    },

    /// No response in time
    #[error("Backend '{backend}' timed out")]
    Timeout {
        /// Backend id
        backend: String,
    },

    /// The target URL could not be built
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Forwards a request to one backend
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send `request` to `backend` and buffer the answer
    async fn forward(
        &self,
        backend: &BackendDescriptor,
        request: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError>;
}

/// HTTP upstream over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    /// Create an upstream with a per-request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(64)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn forward(
        &self,
        backend: &BackendDescriptor,
        request: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        let url = backend
            .url_for(&request.path_and_query)
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    backend: backend.id.clone(),
                }
            } else {
                UpstreamError::Connect {
                    backend: backend.id.clone(),
                    message: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport)?;

        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }
}

/// State for the proxy surface
#[derive(Clone)]
pub struct ProxyState {
    /// Routing policy
    pub policy: Arc<RoutingPolicy>,
    /// Forwarder
    pub upstream: Arc<dyn Upstream>,
    /// Header carrying the client region hint
    pub region_header: HeaderName,
    /// Metrics registry
    pub metrics: Metrics,
}

impl std::fmt::Debug for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyState")
            .field("policy", &self.policy)
            .field("region_header", &self.region_header)
            .finish_non_exhaustive()
    }
}

impl ProxyState {
    /// Create proxy state
    ///
    /// # Errors
    /// Returns a configuration error if `region_header` is not a valid header name
    pub fn new(
        policy: RoutingPolicy,
        upstream: Arc<dyn Upstream>,
        region_header: &str,
        metrics: Metrics,
    ) -> Result<Self, GatewayError> {
        let region_header = HeaderName::from_bytes(region_header.as_bytes()).map_err(|e| {
            GatewayError::configuration(format!("Invalid region header '{region_header}': {e}"))
        })?;
        Ok(Self {
            policy: Arc::new(policy),
            upstream,
            region_header,
            metrics,
        })
    }

    fn route_context(&self, headers: &HeaderMap) -> RouteContext {
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());

        RouteContext {
            affinity_token: self.policy.affinity().token_from_cookies(cookies),
            region_hint: headers
                .get(&self.region_header)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }

    /// Forward to one backend and record what happened
    async fn attempt(
        &self,
        backend: &BackendDescriptor,
        request: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        let mut request = request.clone();
        if let Ok(value) = HeaderValue::from_str(&backend.id) {
            request.headers.insert(PREFERRED_BACKEND_HEADER, value);
        }

        match self.upstream.forward(backend, &request).await {
            Ok(response) => {
                let observed = self
                    .policy
                    .observe(&backend.id, Observation::Status(response.status.as_u16()))
                    .await;
                if let Some(state) = observed {
                    self.metrics.record_health_mark(&backend.id, &state.to_string());
                }
                Ok(response)
            }
            Err(err) => {
                warn!(backend = %backend.id, error = %err, "Backend unreachable");
                self.policy
                    .observe(&backend.id, Observation::TransportFailure)
                    .await;
                self.metrics.record_health_mark(&backend.id, "unhealthy");
                Err(err)
            }
        }
    }

    fn respond(
        &self,
        preferred: &BackendDescriptor,
        served: &BackendDescriptor,
        upstream: ForwardResponse,
    ) -> Response {
        let mut headers = upstream.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        if let Ok(cookie) = HeaderValue::from_str(&self.policy.affinity_cookie(served)) {
            headers.append(header::SET_COOKIE, cookie);
        }
        if let Ok(value) = HeaderValue::from_str(&preferred.id) {
            headers.insert(PREFERRED_BACKEND_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&served.id) {
            headers.insert(SERVED_BACKEND_HEADER, value);
        }

        let mut response = Response::new(Body::from(upstream.body));
        *response.status_mut() = upstream.status;
        *response.headers_mut() = headers;
        response
    }

    fn exhausted(&self, attempts: u32, last_error: &UpstreamError) -> ApiError {
        self.metrics.record_routing_exhausted();
        ApiError::from(GatewayError::RoutingExhausted {
            attempts,
            last_error: last_error.to_string(),
        })
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Forward any request not handled locally to the chosen backend
#[instrument(skip_all, fields(method = %method, path = %uri.path()))]
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = state.route_context(&headers);

    let mut forwarded_headers = headers;
    strip_hop_by_hop(&mut forwarded_headers);
    forwarded_headers.remove(header::CONTENT_LENGTH);

    let request = ForwardRequest {
        method,
        path_and_query: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string()),
        headers: forwarded_headers,
        body,
    };

    let decision = state.policy.decide(&ctx).await;
    debug!(
        backend = %decision.backend.id,
        preference = decision.preference.as_str(),
        affinity = decision.affinity.as_str(),
        "Route decided"
    );
    state
        .metrics
        .record_route_decision(&decision.backend.id, decision.preference.as_str());

    let preferred = decision.backend;
    let first_error = match state.attempt(&preferred, &request).await {
        Ok(response) => return Ok(state.respond(&preferred, &preferred, response)),
        Err(err) => err,
    };

    let Some(retry) = state.policy.failover(&ctx, &preferred.id).await else {
        return Err(state.exhausted(1, &first_error));
    };
    state.metrics.record_failover();
    state
        .metrics
        .record_route_decision(&retry.backend.id, retry.preference.as_str());

    match state.attempt(&retry.backend, &request).await {
        Ok(response) => Ok(state.respond(&preferred, &retry.backend, response)),
        Err(err) => Err(state.exhausted(2, &err)),
    }
}

#[derive(Debug, Serialize)]
struct BackendStatus {
    id: String,
    base_url: String,
    region: Option<String>,
    state: String,
    last_updated: Option<String>,
}

/// List backends with their derived health
pub async fn list_backends(State(state): State<ProxyState>) -> impl IntoResponse {
    let backends: Vec<BackendStatus> = state
        .policy
        .snapshot()
        .await
        .into_iter()
        .map(|(backend, health)| BackendStatus {
            id: backend.id,
            base_url: backend.base_url.to_string(),
            region: backend.region,
            state: health.state.to_string(),
            last_updated: health.last_updated.map(|t| t.to_rfc3339()),
        })
        .collect();

    Json(serde_json::json!({ "backends": backends }))
}

/// Metrics endpoint for the proxy surface
pub async fn proxy_metrics(State(state): State<ProxyState>) -> Result<impl IntoResponse, ApiError> {
    crate::handlers::render_metrics(&state.metrics)
}
