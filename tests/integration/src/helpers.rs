//! Test helper utilities for integration tests

use axum::Router;
use gateway_resilience::HealthTracker;
use gateway_routing::{AffinityConfig, BackendDescriptor, BackendSet, GeoPreferences, RoutingPolicy};
use gateway_server::{create_proxy_router, ProxyState, ReqwestUpstream, SERVED_BACKEND_HEADER};
use gateway_telemetry::Metrics;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Header carrying the client region in test gateways
pub const REGION_HEADER: &str = "x-client-region";

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Router served on a loopback port for the duration of a test
pub struct TestServer {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Base URL for the server
    pub base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral port
    pub async fn new(router: Router) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Serve a routing gateway in front of `backends`
    pub async fn gateway(
        backends: Vec<BackendDescriptor>,
        health_ttl: Duration,
        regions: &HashMap<String, String>,
    ) -> Self {
        Self::new(create_proxy_router(proxy_state(backends, health_ttl, regions))).await
    }

    /// Full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a path
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// POST to a path with no body
    pub async fn post(&self, path: &str) -> Response {
        self.post_with_headers(path, &[]).await
    }

    /// POST to a path with extra headers
    pub async fn post_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut request = self.client.post(self.url(path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("Request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Build proxy state with a plain-HTTP affinity cookie
pub fn proxy_state(
    backends: Vec<BackendDescriptor>,
    health_ttl: Duration,
    regions: &HashMap<String, String>,
) -> ProxyState {
    proxy_state_with_timeout(backends, health_ttl, regions, Duration::from_secs(5))
}

/// Build proxy state with a specific per-attempt upstream timeout
pub fn proxy_state_with_timeout(
    backends: Vec<BackendDescriptor>,
    health_ttl: Duration,
    regions: &HashMap<String, String>,
    upstream_timeout: Duration,
) -> ProxyState {
    let backends = BackendSet::new(backends).expect("Invalid backend set");
    let geo = GeoPreferences::new(&backends, regions);
    let policy = RoutingPolicy::new(
        backends,
        HealthTracker::in_memory(health_ttl),
        AffinityConfig::default().with_secure(false),
    )
    .with_geo(geo);

    let upstream = ReqwestUpstream::new(upstream_timeout).expect("Failed to build upstream");
    ProxyState::new(
        policy,
        Arc::new(upstream),
        REGION_HEADER,
        Metrics::new().expect("Failed to create metrics"),
    )
    .expect("Invalid proxy state")
}

/// URL of a loopback port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Backend id the gateway reports as having served a response
pub fn served_by(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SERVED_BACKEND_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// The affinity cookie set on a response, if any
pub fn affinity_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("grounding_backend="))
        .map(String::from)
}

/// Assert response status
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {expected}, got {}",
        response.status()
    );
}

/// Poll until `check` holds or a second has passed
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
