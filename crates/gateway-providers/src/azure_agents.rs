//! Azure AI Agents client.
//!
//! One grounded answer is one exchange on a fresh conversation thread:
//! - `POST {endpoint}/threads` opens the thread
//! - `POST .../threads/{thread}/messages` submits the query
//! - `POST .../threads/{thread}/runs` starts the agent, then the run is polled
//! - `GET .../threads/{thread}/messages?order=desc` reads the answer
//! - `DELETE .../threads/{thread}` releases the thread on every exit path
//!
//! Authentication is a bearer token in the `Authorization` header and every
//! call carries the `api-version` query parameter.

use async_trait::async_trait;
use gateway_core::{
    AgentDirectory, AgentHandle, AgentSpec, AnswerResult, GatewayError, GatewayResult,
    GroundingClient, RemoteAgent, RemoteError,
};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::citations::{resolve_citations, UrlAnnotation};

/// Agents REST API version
pub const DEFAULT_API_VERSION: &str = "2025-05-01";

/// Default limit for one complete exchange
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between run status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const LIST_PAGE_SIZE: u32 = 100;

/// Azure AI Agents client configuration
#[derive(Debug, Clone)]
pub struct AzureAgentsConfig {
    /// Project endpoint, e.g. `https://<resource>.services.ai.azure.com/api/projects/<project>`
    pub endpoint: String,
    /// Bearer token
    pub token: SecretString,
    /// API version
    pub api_version: String,
    /// Limit for a single HTTP call
    pub request_timeout: Duration,
    /// Limit for one complete exchange
    pub run_timeout: Duration,
    /// Delay between run status polls
    pub poll_interval: Duration,
    /// Bing connection attached to created agents
    pub bing_connection_id: Option<String>,
}

impl AzureAgentsConfig {
    /// Create a configuration with default timings
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: SecretString) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bing_connection_id: None,
        }
    }

    /// Set the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the per-call HTTP timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the limit for one complete exchange
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Set the run polling interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Attach a Bing connection to agents created through this client
    #[must_use]
    pub fn with_bing_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.bing_connection_id = Some(connection_id.into());
        self
    }
}

/// Client for the Azure AI Agents service.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct AzureAgentsClient {
    config: Arc<AzureAgentsConfig>,
    http: Client,
}

impl std::fmt::Debug for AzureAgentsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAgentsClient")
            .field("endpoint", &self.config.endpoint)
            .field("api_version", &self.config.api_version)
            .finish_non_exhaustive()
    }
}

impl AzureAgentsClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns error if the endpoint is empty or the HTTP client cannot be created
    pub fn new(config: AzureAgentsConfig) -> GatewayResult<Self> {
        if config.endpoint.is_empty() {
            return Err(GatewayError::configuration(
                "Azure AI project endpoint must not be empty",
            ));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &AzureAgentsConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.config.endpoint))
            .query(&[("api-version", self.config.api_version.as_str())])
            .bearer_auth(self.config.token.expose_secret())
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::service(None, format!("Failed to parse response: {e}")))
    }

    fn transport_error(&self, err: &reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.config.request_timeout)
        } else {
            RemoteError::service(None, format!("Request failed: {err}"))
        }
    }

    async fn create_thread(&self) -> Result<String, RemoteError> {
        let thread: IdObject = self
            .send(self.request(Method::POST, "threads").json(&serde_json::json!({})))
            .await?;
        Ok(thread.id)
    }

    async fn delete_thread(&self, thread_id: &str) {
        let path = format!("threads/{thread_id}");
        match self.request(Method::DELETE, &path).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(thread_id = %thread_id, "Thread deleted");
            }
            Ok(response) => {
                warn!(
                    thread_id = %thread_id,
                    status = response.status().as_u16(),
                    "Failed to delete thread"
                );
            }
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Failed to delete thread");
            }
        }
    }

    async fn answer_on_thread(
        &self,
        thread_id: &str,
        handle: &AgentHandle,
        query: &str,
    ) -> Result<AnswerResult, RemoteError> {
        let _: IdObject = self
            .send(
                self.request(Method::POST, &format!("threads/{thread_id}/messages"))
                    .json(&CreateMessage {
                        role: "user",
                        content: query,
                    }),
            )
            .await?;

        let run: Run = self
            .send(
                self.request(Method::POST, &format!("threads/{thread_id}/runs"))
                    .json(&CreateRun {
                        assistant_id: &handle.remote_id,
                    }),
            )
            .await?;
        debug!(thread_id = %thread_id, run_id = %run.id, route = %handle.route, "Run started");

        self.wait_for_run(thread_id, run).await?;

        let messages: MessageList = self
            .send(
                self.request(Method::GET, &format!("threads/{thread_id}/messages"))
                    .query(&[("order", "desc")]),
            )
            .await?;

        messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(ThreadMessage::into_answer)
            .ok_or_else(|| {
                RemoteError::service(None, "Run completed without an assistant message")
            })
    }

    async fn wait_for_run(&self, thread_id: &str, mut run: Run) -> Result<(), RemoteError> {
        loop {
            match run.status {
                RunStatus::Completed => return Ok(()),
                RunStatus::Failed => return Err(run_failure(run.last_error)),
                RunStatus::Cancelled | RunStatus::Expired => {
                    return Err(RemoteError::service(
                        None,
                        format!("Run {} ended with status {:?}", run.id, run.status),
                    ));
                }
                RunStatus::RequiresAction => {
                    return Err(RemoteError::service(
                        None,
                        format!("Run {} requires a client-side tool call", run.id),
                    ));
                }
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling | RunStatus::Other => {}
            }

            tokio::time::sleep(self.config.poll_interval).await;
            run = self
                .send(self.request(Method::GET, &format!("threads/{thread_id}/runs/{}", run.id)))
                .await?;
        }
    }

    async fn exchange(
        &self,
        thread: &mut ThreadGuard,
        handle: &AgentHandle,
        query: &str,
    ) -> Result<AnswerResult, RemoteError> {
        let thread_id = thread.open().await?;
        self.answer_on_thread(&thread_id, handle, query).await
    }

    async fn list_page(&self, after: Option<&str>) -> Result<AgentPage, RemoteError> {
        let limit = LIST_PAGE_SIZE.to_string();
        let mut builder = self
            .request(Method::GET, "assistants")
            .query(&[("limit", limit.as_str()), ("order", "asc")]);
        if let Some(after) = after {
            builder = builder.query(&[("after", after)]);
        }
        self.send(builder).await
    }
}

/// Owns the conversation thread of one exchange.
///
/// The create call runs as its own task, so a thread whose creation is cut
/// off by the run timeout still gets its id and is deleted once the call
/// lands. Whatever the guard still holds when dropped is deleted by a
/// detached task.
struct ThreadGuard {
    client: AzureAgentsClient,
    thread_id: Option<String>,
    creating: Option<JoinHandle<Result<String, RemoteError>>>,
}

impl ThreadGuard {
    fn new(client: AzureAgentsClient) -> Self {
        Self {
            client,
            thread_id: None,
            creating: None,
        }
    }

    async fn open(&mut self) -> Result<String, RemoteError> {
        let client = self.client.clone();
        let creating = self
            .creating
            .insert(tokio::spawn(async move { client.create_thread().await }));
        let joined = creating.await;
        self.creating = None;

        let thread_id = joined
            .map_err(|e| RemoteError::service(None, format!("Thread creation aborted: {e}")))??;
        self.thread_id = Some(thread_id.clone());
        Ok(thread_id)
    }

    /// Delete the thread. An open thread is deleted before returning; a
    /// creation still in flight is cleaned up in the background.
    async fn release(mut self) {
        if let Some(thread_id) = self.thread_id.take() {
            self.client.delete_thread(&thread_id).await;
        }
        if let Some(creating) = self.creating.take() {
            tokio::spawn(delete_when_created(self.client.clone(), creating));
        }
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        let thread_id = self.thread_id.take();
        let creating = self.creating.take();
        if thread_id.is_none() && creating.is_none() {
            return;
        }
        match Handle::try_current() {
            Ok(runtime) => {
                let client = self.client.clone();
                runtime.spawn(async move {
                    if let Some(thread_id) = thread_id {
                        client.delete_thread(&thread_id).await;
                    }
                    if let Some(creating) = creating {
                        delete_when_created(client, creating).await;
                    }
                });
            }
            Err(_) => {
                warn!(thread_id = ?thread_id, "No runtime available, thread left for remote expiry");
            }
        }
    }
}

async fn delete_when_created(
    client: AzureAgentsClient,
    creating: JoinHandle<Result<String, RemoteError>>,
) {
    if let Ok(Ok(thread_id)) = creating.await {
        debug!(thread_id = %thread_id, "Deleting thread created after the exchange ended");
        client.delete_thread(&thread_id).await;
    }
}

#[async_trait]
impl GroundingClient for AzureAgentsClient {
    async fn invoke(&self, handle: &AgentHandle, query: &str) -> Result<AnswerResult, RemoteError> {
        let started = Instant::now();
        let mut thread = ThreadGuard::new(self.clone());
        let exchange = self.exchange(&mut thread, handle, query);
        let outcome = match tokio::time::timeout(self.config.run_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemoteError::Timeout(self.config.run_timeout)),
        };
        // Cleanup runs outside the run timeout and never changes the outcome
        thread.release().await;

        match &outcome {
            Ok(answer) => info!(
                route = %handle.route,
                model = %handle.model,
                citations = answer.citations.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "Grounded answer received"
            ),
            Err(e) => warn!(
                route = %handle.route,
                model = %handle.model,
                kind = e.kind(),
                error = %e,
                latency_ms = started.elapsed().as_millis() as u64,
                "Grounded answer failed"
            ),
        }
        outcome
    }

    fn name(&self) -> &'static str {
        "azure-ai-agents"
    }
}

#[async_trait]
impl AgentDirectory for AzureAgentsClient {
    async fn list_agents(&self) -> GatewayResult<Vec<RemoteAgent>> {
        let mut agents = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self
                .list_page(after.as_deref())
                .await
                .map_err(|e| GatewayError::provisioning(format!("Failed to list agents: {e}")))?;
            let last_id = page
                .last_id
                .or_else(|| page.data.last().map(|a| a.id.clone()));
            agents.extend(page.data);

            match last_id {
                Some(last) if page.has_more => after = Some(last),
                _ => break,
            }
        }

        debug!(count = agents.len(), "Listed remote agents");
        Ok(agents)
    }

    async fn create_agent(&self, spec: &AgentSpec) -> GatewayResult<RemoteAgent> {
        let body = CreateAgent {
            model: spec.model.as_str(),
            name: &spec.name,
            instructions: &spec.instructions,
            tools: vec![BingTool::new(self.config.bing_connection_id.as_deref())],
        };

        let agent: RemoteAgent = self
            .send(self.request(Method::POST, "assistants").json(&body))
            .await
            .map_err(|e| {
                GatewayError::provisioning(format!("Failed to create agent '{}': {e}", spec.name))
            })?;

        info!(name = %spec.name, agent_id = %agent.id, model = %spec.model, "Created agent");
        Ok(agent)
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| match e.error.code {
            Some(code) => format!("{code}: {}", e.error.message),
            None => e.error.message,
        })
        .unwrap_or(body);

    Err(RemoteError::from_status(status.as_u16(), message, retry_after))
}

fn run_failure(last_error: Option<RunError>) -> RemoteError {
    match last_error {
        Some(err) if err.code.as_deref() == Some("rate_limit_exceeded") => {
            RemoteError::RateLimited { retry_after: None }
        }
        Some(err) => RemoteError::service(
            None,
            format!(
                "Run failed: {}: {}",
                err.code.as_deref().unwrap_or("unknown"),
                err.message.unwrap_or_default()
            ),
        ),
        None => RemoteError::service(None, "Run failed without error details"),
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRun<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RunError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Run {
    id: String,
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

impl ThreadMessage {
    fn into_answer(self) -> AnswerResult {
        let mut text = Vec::new();
        let mut annotations = Vec::new();

        for part in self.content {
            if part.content_type != "text" {
                continue;
            }
            let Some(body) = part.text else { continue };
            text.push(body.value);
            annotations.extend(body.annotations.into_iter().filter_map(|a| {
                let citation = a.url_citation?;
                Some(UrlAnnotation {
                    marker: a.text.unwrap_or_default(),
                    url: citation.url,
                    title: citation.title,
                })
            }));
        }

        resolve_citations(&text.join("\n\n"), &annotations)
    }
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url_citation: Option<UrlCitation>,
}

#[derive(Debug, Deserialize)]
struct UrlCitation {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentPage {
    #[serde(default)]
    data: Vec<RemoteAgent>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateAgent<'a> {
    model: &'a str,
    name: &'a str,
    instructions: &'a str,
    tools: Vec<BingTool>,
}

#[derive(Debug, Serialize)]
struct BingTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bing_grounding: Option<BingGrounding>,
}

impl BingTool {
    fn new(connection_id: Option<&str>) -> Self {
        Self {
            tool_type: "bing_grounding",
            bing_grounding: connection_id.map(|id| BingGrounding {
                search_configurations: vec![SearchConfiguration {
                    connection_id: id.to_string(),
                }],
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct BingGrounding {
    search_configurations: Vec<SearchConfiguration>,
}

#[derive(Debug, Serialize)]
struct SearchConfiguration {
    connection_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}
