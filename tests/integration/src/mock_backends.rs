//! Mock API replicas backed by wiremock

use gateway_routing::BackendDescriptor;
use serde_json::json;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One replica behind the gateway
pub struct MockBackend {
    /// Backend id
    pub id: String,
    /// Region, if any
    pub region: Option<String>,
    /// Underlying mock server
    pub server: MockServer,
}

impl MockBackend {
    /// Start a replica answering 200 to everything
    pub async fn start(id: &str) -> Self {
        let backend = Self {
            id: id.to_string(),
            region: None,
            server: MockServer::start().await,
        };
        backend.respond_with(200).await;
        backend
    }

    /// Start a replica in a region
    pub async fn start_in(id: &str, region: &str) -> Self {
        let mut backend = Self::start(id).await;
        backend.region = Some(region.to_string());
        backend
    }

    /// Replace every mounted response with `status`
    pub async fn respond_with(&self, status: u16) {
        self.server.reset().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "backend": self.id,
                "status": status,
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer 200 only after `delay`
    pub async fn respond_after(&self, delay: std::time::Duration) {
        self.server.reset().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(json!({ "backend": self.id, "status": 200 })),
            )
            .mount(&self.server)
            .await;
    }

    /// Descriptor pointing at this replica
    pub fn descriptor(&self) -> BackendDescriptor {
        let descriptor =
            BackendDescriptor::new(&self.id, &self.server.uri()).expect("Invalid backend URL");
        match &self.region {
            Some(region) => descriptor.with_region(region),
            None => descriptor,
        }
    }

    /// Number of requests this replica has received
    pub async fn hits(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

/// Start replicas `a`, `b`, `c`, ... in order
pub async fn start_backends(ids: &[&str]) -> Vec<MockBackend> {
    let mut backends = Vec::with_capacity(ids.len());
    for id in ids {
        backends.push(MockBackend::start(id).await);
    }
    backends
}

/// Descriptors for a slice of replicas
pub fn descriptors(backends: &[MockBackend]) -> Vec<BackendDescriptor> {
    backends.iter().map(MockBackend::descriptor).collect()
}
