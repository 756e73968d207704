//! API error responses.
//!
//! Every failure leaves the server as `{"error": {"type", "message"}}`.
//! Remote failures keep their status class but never their provider detail.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{GatewayError, RemoteError};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, warn};

/// Error returned by handlers
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Machine-readable kind
    pub error_type: &'static str,
    /// Client-facing message
    pub message: String,
    /// Extra structured context
    pub details: Option<Value>,
    /// `Retry-After` to send, if any
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Create an error
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    /// 400 for invalid client input
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    /// 404 for an unknown resource
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 500 with a generic message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn remote(err: &RemoteError) -> Self {
        let message = match err {
            RemoteError::Authentication { .. } => {
                "The gateway is not authorized to call the grounding service"
            }
            RemoteError::RateLimited { .. } => {
                "The grounding service is rate limiting requests; retry later"
            }
            RemoteError::ServiceError { .. } => "The grounding service returned an error",
            RemoteError::Timeout(_) => "The grounding service did not answer in time",
        };

        let mut api = Self::new(status_from(err.http_status()), err.kind(), message);
        if let RemoteError::RateLimited { retry_after } = err {
            api.retry_after = *retry_after;
        }
        api
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Remote(remote) => {
                warn!(kind = remote.kind(), error = %remote, "Remote call failed");
                Self::remote(remote)
            }
            GatewayError::Validation { message, field } => {
                let api = Self::bad_request(message.clone());
                match field {
                    Some(field) => api.with_details(json!({ "field": field })),
                    None => api,
                }
            }
            GatewayError::RouteNotFound { .. } | GatewayError::NoAgentAvailable { .. } => {
                Self::new(status_from(err.http_status()), err.kind(), err.to_string())
            }
            GatewayError::RoutingExhausted { attempts, .. } => {
                warn!(error = %err, "Routing exhausted");
                Self::new(
                    status_from(err.http_status()),
                    err.kind(),
                    format!("No backend could serve the request after {attempts} attempt(s)"),
                )
            }
            GatewayError::Configuration { .. }
            | GatewayError::Provisioning { .. }
            | GatewayError::Internal { .. } => {
                error!(error = %err, "Internal error while handling request");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": {
                "type": self.error_type,
                "message": self.message,
            }
        });
        if let Some(details) = self.details {
            body["error"]["details"] = details;
        }

        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
