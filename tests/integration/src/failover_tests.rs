//! Health marking, passive recovery and one-shot failover through the gateway

use crate::helpers::*;
use crate::mock_backends::*;
use gateway_config::{BackendConfig, GatewayConfig};
use gateway_server::create_proxy_router;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const LONG_TTL: Duration = Duration::from_secs(30);

/// A healthy first backend takes traffic
#[tokio::test]
async fn test_first_configured_backend_preferred() {
    let backends = start_backends(&["a", "b", "c"]).await;
    let gateway = TestServer::gateway(descriptors(&backends), LONG_TTL, &HashMap::new()).await;

    let response = gateway.post("/bing-grounding?query=hi").await;
    assert_status(&response, 200);
    assert_eq!(served_by(&response).as_deref(), Some("a"));
    assert_eq!(backends[0].hits().await, 1);
    assert_eq!(backends[1].hits().await, 0);
}

/// A 503 from A is passed through, then traffic shifts to B
#[tokio::test]
async fn test_server_error_marks_backend_unhealthy() {
    let backends = start_backends(&["a", "b", "c"]).await;
    backends[0].respond_with(503).await;
    let gateway = TestServer::gateway(descriptors(&backends), LONG_TTL, &HashMap::new()).await;

    let first = gateway.post("/bing-grounding?query=hi").await;
    assert_status(&first, 503);
    assert_eq!(served_by(&first).as_deref(), Some("a"));

    let second = gateway.post("/bing-grounding?query=hi").await;
    assert_status(&second, 200);
    assert_eq!(served_by(&second).as_deref(), Some("b"));

    let body: Value = gateway.get("/gateway/backends").await.json().await.unwrap();
    assert_eq!(body["backends"][0]["id"], "a");
    assert_eq!(body["backends"][0]["state"], "unhealthy");
    assert_eq!(body["backends"][1]["state"], "healthy");
    assert_eq!(body["backends"][2]["state"], "unknown");
}

/// Rate limiting and auth failures also mark unhealthy; 404 does not
#[tokio::test]
async fn test_status_classification() {
    let backends = start_backends(&["a", "b", "c"]).await;
    backends[0].respond_with(429).await;
    backends[1].respond_with(401).await;
    let gateway = TestServer::gateway(descriptors(&backends), LONG_TTL, &HashMap::new()).await;

    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("a"));
    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("b"));

    backends[2].respond_with(404).await;
    let third = gateway.post("/x").await;
    assert_status(&third, 404);
    assert_eq!(served_by(&third).as_deref(), Some("c"));

    let body: Value = gateway.get("/gateway/backends").await.json().await.unwrap();
    assert_eq!(body["backends"][2]["state"], "unknown");
}

/// An unhealthy backend becomes eligible again once its mark expires
#[tokio::test]
async fn test_unhealthy_mark_expires() {
    let backends = start_backends(&["a", "b"]).await;
    backends[0].respond_with(500).await;
    let gateway =
        TestServer::gateway(descriptors(&backends), Duration::from_millis(200), &HashMap::new())
            .await;

    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("a"));
    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("b"));

    backends[0].respond_with(200).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let recovered = gateway.post("/x").await;
    assert_status(&recovered, 200);
    assert_eq!(served_by(&recovered).as_deref(), Some("a"));
}

/// With every backend unhealthy the gateway still forwards somewhere
#[tokio::test]
async fn test_all_unhealthy_falls_back_to_full_set() {
    let backends = start_backends(&["a", "b"]).await;
    backends[0].respond_with(502).await;
    backends[1].respond_with(502).await;
    let gateway = TestServer::gateway(descriptors(&backends), LONG_TTL, &HashMap::new()).await;

    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("a"));
    assert_eq!(served_by(&gateway.post("/x").await).as_deref(), Some("b"));

    let third = gateway.post("/x").await;
    assert_status(&third, 502);
    assert!(served_by(&third).is_some());
}

/// A connection failure to A is retried once against B
#[tokio::test]
async fn test_transport_failure_fails_over_once() {
    let b = MockBackend::start("b").await;
    let a = gateway_routing::BackendDescriptor::new("a", &closed_port_url().await).unwrap();
    let gateway = TestServer::gateway(vec![a, b.descriptor()], LONG_TTL, &HashMap::new()).await;

    let response = gateway.post("/bing-grounding?query=hi").await;
    assert_status(&response, 200);
    assert_eq!(served_by(&response).as_deref(), Some("b"));
    assert_eq!(
        response
            .headers()
            .get(gateway_server::PREFERRED_BACKEND_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("a")
    );
    assert!(affinity_cookie(&response).unwrap().starts_with("grounding_backend=b;"));
    assert_eq!(b.hits().await, 1);

    let body: Value = gateway.get("/gateway/backends").await.json().await.unwrap();
    assert_eq!(body["backends"][0]["state"], "unhealthy");

    let metrics = gateway.get("/metrics").await.text().await.unwrap();
    assert!(metrics.contains("gateway_upstream_failovers_total 1"));
}

/// Two unreachable backends exhaust routing after one retry
#[tokio::test]
async fn test_routing_exhausted_after_single_retry() {
    let a = gateway_routing::BackendDescriptor::new("a", &closed_port_url().await).unwrap();
    let b = gateway_routing::BackendDescriptor::new("b", &closed_port_url().await).unwrap();
    let c = MockBackend::start("c").await;
    let gateway = TestServer::gateway(vec![a, b, c.descriptor()], LONG_TTL, &HashMap::new()).await;

    let response = gateway.post("/x").await;
    assert_status(&response, 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "routing_exhausted");
    assert_eq!(c.hits().await, 0);

    // Both failures are remembered, so the next request lands on C
    let next = gateway.post("/x").await;
    assert_eq!(served_by(&next).as_deref(), Some("c"));
}

/// A backend that times out is marked and failed over before the whole
/// request runs out of time
#[tokio::test]
async fn test_upstream_timeout_fails_over_within_request_timeout() {
    let backends = start_backends(&["a", "b"]).await;
    backends[0].respond_after(Duration::from_secs(3)).await;

    let mut config = GatewayConfig::default();
    config.server.request_timeout = Duration::from_millis(1500);
    config.gateway.upstream_timeout = Duration::from_millis(300);
    config.gateway.backends = backends
        .iter()
        .map(|b| BackendConfig {
            id: b.id.clone(),
            base_url: b.server.uri(),
            region: None,
        })
        .collect();
    config.check().unwrap();

    let state = proxy_state_with_timeout(
        descriptors(&backends),
        LONG_TTL,
        &HashMap::new(),
        config.gateway.upstream_timeout,
    );
    let router = create_proxy_router(state).layer(tower_http::timeout::TimeoutLayer::new(
        config.server.request_timeout,
    ));
    let gateway = TestServer::new(router).await;

    let response = gateway.post("/bing-grounding?query=hi").await;
    assert_status(&response, 200);
    assert_eq!(served_by(&response).as_deref(), Some("b"));

    let body: Value = gateway.get("/gateway/backends").await.json().await.unwrap();
    assert_eq!(body["backends"][0]["state"], "unhealthy");
    assert_eq!(body["backends"][1]["state"], "healthy");
}
