//! Key-value cache with per-key expiry.
//!
//! Writers are last-write-wins: every `set` replaces the value and restarts
//! the key's TTL. No cross-key coordination is offered or needed.
//!
//! The in-memory backend measures time with `tokio::time::Instant`, so tests
//! running on a paused runtime control expiry with `tokio::time::advance`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend not reachable
    #[error("Cache backend not available: {0}")]
    Unavailable(String),

    /// Stored value could not be decoded
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache backend trait for polymorphic cache implementations
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Get a live value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value, replacing any previous one and resetting its TTL
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Delete a key
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory cache backend, process-wide and reset on restart
#[derive(Debug, Default)]
pub struct MemoryTtlCache {
    entries: DashMap<String, Entry>,
}

impl MemoryTtlCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl TtlCache for MemoryTtlCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        // Removal happens outside the read guard to avoid a shard deadlock.
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!(key = %key, "Cache entry expired");
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
