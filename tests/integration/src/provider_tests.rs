//! Provisioning and invocation against a mocked agents service

use crate::fixtures::*;
use crate::helpers::*;
use gateway_core::{AgentHandle, SupportedModel};
use gateway_providers::{AzureAgentsClient, AzureAgentsConfig};
use gateway_routing::AgentPool;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agents_client(server: &MockServer) -> AzureAgentsClient {
    let config = AzureAgentsConfig::new(server.uri(), SecretString::new("token".to_string()))
        .with_poll_interval(Duration::from_millis(10))
        .with_run_timeout(Duration::from_secs(5));
    AzureAgentsClient::new(config).unwrap()
}

/// Mount a full thread/run/message exchange answering with one citation
async fn mount_exchange(server: &MockServer, assistant_id: &str) {
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_9"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_9/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_9/runs"))
        .and(body_partial_json(json!({"assistant_id": assistant_id})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": "in_progress"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_9/runs/run_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": "completed"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_9/messages"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "msg_2",
                "role": "assistant",
                "content": [{
                    "type": "text",
                    "text": {
                        "value": "Rust 1.80 stabilized LazyLock【4:0†source】【4:1†source】.",
                        "annotations": [
                            {
                                "type": "url_citation",
                                "text": "【4:0†source】",
                                "url_citation": {"url": "https://blog.rust-lang.org", "title": "Rust Blog"}
                            },
                            {
                                "type": "url_citation",
                                "text": "【4:1†source】",
                                "url_citation": {"url": "https://doc.rust-lang.org/std/sync/struct.LazyLock.html"}
                            }
                        ]
                    }
                }]
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/threads/thread_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
        .mount(server)
        .await;
}

/// Existing agents are reused by name; missing ones are created
#[tokio::test]
async fn test_initialize_reuses_and_creates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assistants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "asst_existing", "name": "agent_bing_gpt4o_1", "model": "gpt-4o"}],
            "has_more": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/assistants"))
        .and(body_partial_json(json!({"name": "agent_bing_gpt4o_2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "asst_new", "name": "agent_bing_gpt4o_2", "model": "gpt-4o"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut sizes = BTreeMap::new();
    sizes.insert("gpt-4o".to_string(), 2);
    sizes.insert("gpt-4".to_string(), 0);

    let client = agents_client(&server);
    let pool = AgentPool::initialize(&sizes, &client, "Answer with citations.")
        .await
        .unwrap();

    assert_eq!(pool.len(), 2);
    assert_eq!(pool.find_by_route("gpt4o_1").unwrap().remote_id, "asst_existing");
    assert_eq!(pool.find_by_route("gpt4o_2").unwrap().remote_id, "asst_new");
    assert_eq!(pool.group_size(SupportedModel::Gpt4), 0);
}

/// An unknown model name in the desired counts aborts before any remote call
#[tokio::test]
async fn test_initialize_rejects_unknown_model() {
    let server = MockServer::start().await;
    let mut sizes = BTreeMap::new();
    sizes.insert("gpt-9".to_string(), 1);

    let result = AgentPool::initialize(&sizes, &agents_client(&server), "x").await;
    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

/// The API answers through the real client and cleans up its thread
#[tokio::test]
async fn test_api_with_agents_service() {
    let server = MockServer::start().await;
    mount_exchange(&server, "asst_live").await;

    let pool = AgentPool::from_handles(vec![AgentHandle::new(SupportedModel::Gpt4o, 1, "asst_live")])
        .unwrap();
    let api = TestServer::new(api_router_with(pool, Arc::new(agents_client(&server)))).await;

    let response = api.post("/bing-grounding?query=lazylock").await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["content"], "Rust 1.80 stabilized LazyLock[1][2].");
    assert_eq!(body["citations"][0]["title"], "Rust Blog");
    assert_eq!(
        body["citations"][1]["title"],
        "https://doc.rust-lang.org/std/sync/struct.LazyLock.html"
    );

    let deleted = eventually(|| async {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .any(|r| r.method.as_str() == "DELETE")
    })
    .await;
    assert!(deleted, "thread was not deleted");
}

/// Remote rate limiting surfaces as 503 with Retry-After
#[tokio::test]
async fn test_remote_rate_limit_maps_to_503() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let pool = AgentPool::from_handles(vec![AgentHandle::new(SupportedModel::Gpt4o, 1, "asst_live")])
        .unwrap();
    let api = TestServer::new(api_router_with(pool, Arc::new(agents_client(&server)))).await;

    let response = api.post("/bing-grounding?query=q").await;
    assert_status(&response, 503);
    assert_eq!(
        response.headers().get("retry-after").and_then(|v| v.to_str().ok()),
        Some("7")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "rate_limited");
}
