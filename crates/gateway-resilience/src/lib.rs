//! # Gateway Resilience
//!
//! Passive failure handling for the grounding gateway:
//! - A shared key-value cache with per-key TTL
//! - Backend health tracking on top of it, where an unhealthy mark
//!   expires on its own and the backend becomes eligible again

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod health;
pub mod ttl_cache;

// Re-export main types
pub use health::{BackendHealth, HealthState, HealthTracker, DEFAULT_HEALTH_TTL};
pub use ttl_cache::{CacheError, CacheResult, MemoryTtlCache, TtlCache};
