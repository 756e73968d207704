//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id set by the request-id middleware, or generated here
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(id.clone());
        }

        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGroundingParams {
    query: Option<String>,
    model: Option<String>,
}

/// Query and optional model for a grounding request.
///
/// Read from the `query`/`model` URL parameters, falling back to a JSON body
/// `{"query": "...", "model": "..."}` when the parameter is absent. A blank
/// query is rejected with 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingParams {
    /// Question to answer
    pub query: String,
    /// Requested model, if given
    pub model: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for GroundingParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let Query(from_url) = Query::<RawGroundingParams>::from_request_parts(&mut parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid query string: {e}")))?;

        let req = Request::from_parts(parts, body);
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;

        let from_body = if bytes.iter().all(u8::is_ascii_whitespace) {
            RawGroundingParams::default()
        } else {
            serde_json::from_slice::<RawGroundingParams>(&bytes).map_err(|e| {
                debug!(error = %e, "JSON parse error");
                ApiError::bad_request(format!("Invalid JSON: {e}"))
            })?
        };

        let query = from_url
            .query
            .filter(|q| !q.trim().is_empty())
            .or(from_body.query)
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                ApiError::bad_request("Parameter 'query' is required and must not be empty")
                    .with_details(serde_json::json!({ "field": "query" }))
            })?;

        let model = from_url
            .model
            .or(from_body.model)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(Self { query, model })
    }
}
