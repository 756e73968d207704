//! Session affinity tokens.
//!
//! The token is a cookie whose value is a backend id. It is reissued on
//! every response with a fresh `Max-Age`, so a client stays pinned for as
//! long as it keeps talking to the gateway and its backend stays eligible.

use serde::Serialize;
use std::time::Duration;

/// Default cookie name
pub const DEFAULT_AFFINITY_COOKIE: &str = "grounding_backend";

/// Default token lifetime (24 hours)
pub const DEFAULT_AFFINITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Affinity state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityState {
    /// The request carried no token
    NoAffinity,
    /// The token names an eligible backend
    Valid,
    /// The token names an unknown or ineligible backend
    Stale,
}

impl AffinityState {
    /// Label for logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAffinity => "none",
            Self::Valid => "valid",
            Self::Stale => "stale",
        }
    }
}

/// How affinity tokens are read and written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityConfig {
    /// Cookie name
    pub cookie_name: String,
    /// Token lifetime
    pub ttl: Duration,
    /// Whether the cookie carries the `Secure` attribute
    pub secure: bool,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_AFFINITY_COOKIE.to_string(),
            ttl: DEFAULT_AFFINITY_TTL,
            secure: true,
        }
    }
}

impl AffinityConfig {
    /// Create a configuration with the default lifetime
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            ..Default::default()
        }
    }

    /// Set the token lifetime
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the `Secure` attribute
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Extract the token from `Cookie` header values.
    ///
    /// The last occurrence wins when a client sends the cookie twice.
    pub fn token_from_cookies<'a, I>(&self, cookie_headers: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        cookie_headers
            .into_iter()
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| name.trim() == self.cookie_name)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
            .last()
    }

    /// `Set-Cookie` value naming `backend_id`
    #[must_use]
    pub fn set_cookie(&self, backend_id: &str) -> String {
        let mut cookie = format!(
            "{}={backend_id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name,
            self.ttl.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
