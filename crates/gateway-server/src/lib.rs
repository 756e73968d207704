//! # Gateway Server
//!
//! HTTP surfaces for the grounding gateway.
//!
//! This crate provides:
//! - The API replica: health, agent listing and grounding endpoints
//! - The reverse proxy that applies the routing policy across replicas
//! - Request id, logging and metrics middleware
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use error::ApiError;
pub use proxy::{
    ForwardRequest, ForwardResponse, ProxyState, ReqwestUpstream, Upstream, UpstreamError,
    PREFERRED_BACKEND_HEADER, SERVED_BACKEND_HEADER,
};
pub use routes::{create_proxy_router, create_router};
pub use server::{shutdown_signal, Server};
pub use state::{AppState, AppStateBuilder};
