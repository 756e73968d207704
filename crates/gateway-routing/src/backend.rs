//! Backend descriptors for the replicas behind the gateway.

use gateway_core::{GatewayError, GatewayResult};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// One replica or region endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    /// Stable name (replica index or region)
    pub id: String,
    /// Base URL requests are forwarded to
    pub base_url: Url,
    /// Region the backend serves, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl BackendDescriptor {
    /// Create a descriptor.
    ///
    /// Ids end up in cookies and headers, so they are limited to ASCII
    /// letters, digits, `-`, `_` and `.`.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid id or URL.
    pub fn new(id: impl Into<String>, base_url: &str) -> GatewayResult<Self> {
        let id = id.into();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(GatewayError::configuration(format!(
                "Invalid backend id '{id}'"
            )));
        }

        let base_url = Url::parse(base_url).map_err(|e| {
            GatewayError::configuration(format!("Invalid URL for backend '{id}': {e}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GatewayError::configuration(format!(
                "Backend '{id}' must use http or https"
            )));
        }

        Ok(Self {
            id,
            base_url,
            region: None,
        })
    }

    /// Set the region
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// URL for a path and query on this backend
    ///
    /// # Errors
    /// Returns an internal error if the joined URL is invalid.
    pub fn url_for(&self, path_and_query: &str) -> GatewayResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let tail = path_and_query.trim_start_matches('/');
        Url::parse(&format!("{base}/{tail}"))
            .map_err(|e| GatewayError::internal(format!("Invalid upstream URL: {e}")))
    }
}

/// Statically configured, ordered, non-empty set of backends
#[derive(Debug, Clone)]
pub struct BackendSet {
    backends: Vec<BackendDescriptor>,
}

impl BackendSet {
    /// Create a set; configured order is the tie-break order.
    ///
    /// # Errors
    /// Returns a configuration error if the set is empty or ids repeat.
    pub fn new(backends: Vec<BackendDescriptor>) -> GatewayResult<Self> {
        if backends.is_empty() {
            return Err(GatewayError::configuration("At least one backend is required"));
        }
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(GatewayError::configuration(format!(
                    "Duplicate backend id '{}'",
                    backend.id
                )));
            }
        }
        Ok(Self { backends })
    }

    /// Look up a backend by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// First configured backend
    #[must_use]
    pub fn first(&self) -> &BackendDescriptor {
        &self.backends[0]
    }

    /// Backends in configured order
    pub fn iter(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.iter()
    }

    /// Number of backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the set is empty (never true for a constructed set)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
