//! Session affinity and geo preference through the gateway

use crate::helpers::*;
use crate::mock_backends::*;
use std::collections::HashMap;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30);

/// A cookie naming a healthy backend is honored and refreshed
#[tokio::test]
async fn test_cookie_pins_backend() {
    let backends = start_backends(&["a", "b", "c"]).await;
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &HashMap::new()).await;

    let response = gateway
        .post_with_headers("/bing-grounding?query=hi", &[("cookie", "grounding_backend=b")])
        .await;
    assert_status(&response, 200);
    assert_eq!(served_by(&response).as_deref(), Some("b"));

    let cookie = affinity_cookie(&response).unwrap();
    assert!(cookie.starts_with("grounding_backend=b;"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(backends[1].hits().await, 1);
}

/// A request without a cookie is given one naming the serving backend
#[tokio::test]
async fn test_cookie_issued_on_first_request() {
    let backends = start_backends(&["a", "b"]).await;
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &HashMap::new()).await;

    let response = gateway.post("/x").await;
    assert!(affinity_cookie(&response).unwrap().starts_with("grounding_backend=a;"));
}

/// Affinity to an unhealthy backend is overridden and rewritten
#[tokio::test]
async fn test_cookie_to_unhealthy_backend_is_rewritten() {
    let backends = start_backends(&["a", "b"]).await;
    backends[1].respond_with(500).await;
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &HashMap::new()).await;
    let pinned = [("cookie", "grounding_backend=b")];

    let first = gateway.post_with_headers("/x", &pinned).await;
    assert_eq!(served_by(&first).as_deref(), Some("b"));

    let second = gateway.post_with_headers("/x", &pinned).await;
    assert_eq!(served_by(&second).as_deref(), Some("a"));
    assert!(affinity_cookie(&second).unwrap().starts_with("grounding_backend=a;"));
}

/// A cookie naming an unknown backend is ignored
#[tokio::test]
async fn test_unknown_cookie_ignored() {
    let backends = start_backends(&["a", "b"]).await;
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &HashMap::new()).await;

    let response = gateway
        .post_with_headers("/x", &[("cookie", "theme=dark; grounding_backend=zz")])
        .await;
    assert_eq!(served_by(&response).as_deref(), Some("a"));
}

/// The client region selects its backend when no affinity exists
#[tokio::test]
async fn test_region_hint_prefers_regional_backend() {
    let backends = vec![
        MockBackend::start_in("us", "eastus").await,
        MockBackend::start_in("eu", "westeurope").await,
    ];
    let mut regions = HashMap::new();
    regions.insert("uksouth".to_string(), "eu".to_string());
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &regions).await;

    let eu = gateway
        .post_with_headers("/x", &[(REGION_HEADER, "westeurope")])
        .await;
    assert_eq!(served_by(&eu).as_deref(), Some("eu"));

    let mapped = gateway
        .post_with_headers("/x", &[(REGION_HEADER, "uksouth")])
        .await;
    assert_eq!(served_by(&mapped).as_deref(), Some("eu"));

    let unknown = gateway
        .post_with_headers("/x", &[(REGION_HEADER, "antarctica")])
        .await;
    assert_eq!(served_by(&unknown).as_deref(), Some("us"));
}

/// Affinity outranks geo
#[tokio::test]
async fn test_affinity_beats_region() {
    let backends = vec![
        MockBackend::start_in("us", "eastus").await,
        MockBackend::start_in("eu", "westeurope").await,
    ];
    let gateway = TestServer::gateway(descriptors(&backends), TTL, &HashMap::new()).await;

    let response = gateway
        .post_with_headers(
            "/x",
            &[(REGION_HEADER, "westeurope"), ("cookie", "grounding_backend=us")],
        )
        .await;
    assert_eq!(served_by(&response).as_deref(), Some("us"));
}
