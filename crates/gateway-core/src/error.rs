//! Error types for the grounding gateway.
//!
//! The taxonomy separates conditions by how they are handled:
//! - `Configuration` and `Provisioning` are fatal at startup
//! - `NoAgentAvailable` is recovered locally by default-model substitution
//! - `Remote` is surfaced to the client as a generic structured error
//! - `RoutingExhausted` ends a gateway request after its single failover

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the workspace
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a single exchange with the remote grounding service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The calling identity lacks rights to the remote project
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Provider message (not forwarded to clients)
        message: String,
    },

    /// The remote service throttled the call
    #[error("Rate limited by remote service")]
    RateLimited {
        /// Suggested wait before retrying, if the provider sent one
        retry_after: Option<Duration>,
    },

    /// The remote service failed (5xx-equivalent)
    #[error("Remote service error: {message}")]
    ServiceError {
        /// HTTP status returned by the provider, if any
        status: Option<u16>,
        /// Provider message (not forwarded to clients)
        message: String,
    },

    /// No complete answer within the allotted time
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Create a service error
    pub fn service(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServiceError {
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status from the provider
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => Self::authentication(message),
            429 => Self::RateLimited { retry_after },
            _ => Self::service(Some(status), message),
        }
    }

    /// Stable machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServiceError { .. } => "remote_service_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// HTTP status the API surface answers with.
    ///
    /// All remote failures are 5xx so the routing layer marks the replica unhealthy.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authentication { .. } | Self::ServiceError { .. } => 502,
            Self::RateLimited { .. } => 503,
            Self::Timeout(_) => 504,
        }
    }
}

/// Main error type for the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or missing required setting
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Pool construction failed to reach the remote service
    #[error("Provisioning error: {message}")]
    Provisioning {
        /// Error message
        message: String,
    },

    /// The model group has no handles
    #[error("No agent available for model '{model}'")]
    NoAgentAvailable {
        /// Requested model
        model: String,
    },

    /// Remote grounding call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Every backend attempt failed
    #[error("Routing exhausted after {attempts} attempt(s): {last_error}")]
    RoutingExhausted {
        /// Number of backends tried
        attempts: u32,
        /// Last transport error observed
        last_error: String,
    },

    /// Invalid client input
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Offending field, if known
        field: Option<String>,
    },

    /// Unknown agent route
    #[error("Agent route not found: {route}")]
    RouteNotFound {
        /// Requested route
        route: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a provisioning error
    pub fn provisioning(message: impl Into<String>) -> Self {
        Self::Provisioning {
            message: message.into(),
        }
    }

    /// Create a no-agent-available error
    pub fn no_agent(model: impl Into<String>) -> Self {
        Self::NoAgentAvailable {
            model: model.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(String::from),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Provisioning { .. } => "provisioning_error",
            Self::NoAgentAvailable { .. } => "no_agent_available",
            Self::Remote(e) => e.kind(),
            Self::RoutingExhausted { .. } => "routing_exhausted",
            Self::Validation { .. } => "invalid_request_error",
            Self::RouteNotFound { .. } => "not_found",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::RouteNotFound { .. } => 404,
            Self::Remote(e) => e.http_status(),
            Self::RoutingExhausted { .. } => 502,
            Self::NoAgentAvailable { .. } => 503,
            Self::Configuration { .. } | Self::Provisioning { .. } | Self::Internal { .. } => 500,
        }
    }
}
