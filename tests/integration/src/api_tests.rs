//! API surface tests, alone and behind the gateway

use crate::fixtures::*;
use crate::helpers::*;
use gateway_core::SupportedModel;
use gateway_routing::BackendDescriptor;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// A model with no agents is served by the default model's group
#[tokio::test]
async fn test_empty_model_group_substitutes_default() {
    let api = TestServer::new(api_router(pool_of(&[
        (SupportedModel::Gpt4o, 2),
        (SupportedModel::Gpt5, 0),
    ])))
    .await;

    let response = api.post("/bing-grounding?query=what%27s%20new&model=gpt-5").await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["metadata"]["model"], "gpt-4o");
    assert_eq!(body["metadata"]["requested_model"], "gpt-5");
    assert_eq!(body["metadata"]["model_substituted"], true);
    let route = body["metadata"]["agent_route"].as_str().unwrap();
    assert!(route == "gpt4o_1" || route == "gpt4o_2", "unexpected route {route}");
    assert_eq!(body["citations"][0]["title"], "Microsoft Learn");
}

/// Health and listing reflect the loaded pool
#[tokio::test]
async fn test_health_and_agents() {
    let api = TestServer::new(api_router(pool_of(&[
        (SupportedModel::Gpt4o, 2),
        (SupportedModel::Gpt35Turbo, 1),
    ])))
    .await;

    let health: Value = api.get("/health").await.json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["agents_loaded"], 3);

    let agents: Value = api.get("/agents").await.json().await.unwrap();
    assert_eq!(agents["total"], 3);
    let routes: Vec<&str> = agents["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["route"].as_str().unwrap())
        .collect();
    assert!(routes.contains(&"/bing-grounding/gpt35turbo_1"));
}

/// Unknown per-agent routes are 404 with the available list
#[tokio::test]
async fn test_unknown_agent_route() {
    let api = TestServer::new(api_router(pool_of(&[(SupportedModel::Gpt4o, 1)]))).await;

    let response = api.post("/bing-grounding/gpt4_7?query=q").await;
    assert_status(&response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["details"]["available"][0], "gpt4o_1");
}

/// An empty pool answers 503 rather than failing startup
#[tokio::test]
async fn test_empty_pool_is_unavailable() {
    let api = TestServer::new(api_router(pool_of(&[]))).await;

    let response = api.post("/bing-grounding?query=q").await;
    assert_status(&response, 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "no_agent_available");
}

/// Two API replicas behind the gateway; the request id survives the hop
#[tokio::test]
async fn test_gateway_in_front_of_api_replicas() {
    let replica_a = TestServer::new(api_router(pool_of(&[(SupportedModel::Gpt4o, 1)]))).await;
    let replica_b = TestServer::new(api_router(pool_of(&[(SupportedModel::Gpt4o, 1)]))).await;
    let gateway = TestServer::gateway(
        vec![
            BackendDescriptor::new("a", &replica_a.base_url).unwrap(),
            BackendDescriptor::new("b", &replica_b.base_url).unwrap(),
        ],
        Duration::from_secs(30),
        &HashMap::new(),
    )
    .await;

    let response = gateway
        .post_with_headers(
            "/bing-grounding?query=hello",
            &[("x-request-id", "trace-123"), ("cookie", "grounding_backend=b")],
        )
        .await;
    assert_status(&response, 200);
    assert_eq!(served_by(&response).as_deref(), Some("b"));
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trace-123")
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["content"], "hello via gpt4o_1[1]");
}

/// A replica that cannot serve the model makes the gateway shift traffic
#[tokio::test]
async fn test_gateway_shifts_away_from_empty_replica() {
    let empty = TestServer::new(api_router(pool_of(&[]))).await;
    let full = TestServer::new(api_router(pool_of(&[(SupportedModel::Gpt4o, 1)]))).await;
    let gateway = TestServer::gateway(
        vec![
            BackendDescriptor::new("empty", &empty.base_url).unwrap(),
            BackendDescriptor::new("full", &full.base_url).unwrap(),
        ],
        Duration::from_secs(30),
        &HashMap::new(),
    )
    .await;

    assert_status(&gateway.post("/bing-grounding?query=q").await, 503);

    let second = gateway.post("/bing-grounding?query=q").await;
    assert_status(&second, 200);
    assert_eq!(served_by(&second).as_deref(), Some("full"));
}
