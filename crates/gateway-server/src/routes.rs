//! Route definitions for both serving surfaces.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware, proxy, proxy::ProxyState, state::AppState};

/// Create the API router served by each replica
pub fn create_router(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/agents", get(handlers::list_agents))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/bing-grounding", post(handlers::bing_grounding))
        .route("/bing-grounding/:agent_route", post(handlers::bing_grounding_route))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .with_state(state)
}

/// Create the gateway router: local introspection, everything else proxied
pub fn create_proxy_router(state: ProxyState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/gateway/backends", get(proxy::list_backends))
        .route("/metrics", get(proxy::proxy_metrics))
        .fallback(proxy::proxy_handler)
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .with_state(state)
}
