//! Remote capability client
//!
//! Connects to an external capability server that publishes tool
//! definitions over HTTP. Discovered tools register into a
//! `ToolRegistry` behind `RemoteExecutor` proxies, so the agent loop
//! dispatches them exactly like local functions. Transport and remote
//! failures surface as executor errors and stay non-fatal.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use tether_core::error::{AgentError, Result};
use tether_core::tool::{ToolDefinition, ToolExecutor, ToolRegistry};

/// HTTP client for a capability server
pub struct CapabilityClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DiscoveryDoc {
    tools: Vec<ToolDefinition>,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl CapabilityClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn tool_url(&self, name: &str) -> String {
        format!("{}/tools/{}/invoke", self.base_url, name)
    }

    /// Fetch the server's published tool definitions
    pub async fn discover(&self) -> Result<Vec<ToolDefinition>> {
        let response = self
            .http
            .get(format!("{}/tools", self.base_url))
            .send()
            .await
            .map_err(|e| AgentError::Executor(format!("capability discovery failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::Executor(format!(
                "capability server returned status {}",
                response.status()
            )));
        }

        let doc: DiscoveryDoc = response
            .json()
            .await
            .map_err(|e| AgentError::Executor(format!("invalid discovery document: {e}")))?;
        Ok(doc.tools)
    }

    /// Invoke a remote tool by name
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Value> {
        let response = self
            .http
            .post(self.tool_url(name))
            .json(&Value::Object(arguments.clone()))
            .send()
            .await
            .map_err(|e| AgentError::Executor(format!("remote invocation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::Executor(format!(
                "remote tool '{}' returned status {}",
                name,
                response.status()
            )));
        }

        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Executor(format!("invalid invocation response: {e}")))?;

        if body.ok == Some(false) {
            return Err(AgentError::Executor(
                body.error
                    .unwrap_or_else(|| format!("remote tool '{name}' reported failure")),
            ));
        }
        Ok(body.output.unwrap_or(Value::Null))
    }
}

/// Executor proxying invocations to a capability server
pub struct RemoteExecutor {
    client: Arc<CapabilityClient>,
    name: String,
}

impl RemoteExecutor {
    pub fn new(client: Arc<CapabilityClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl ToolExecutor for RemoteExecutor {
    async fn invoke(&self, arguments: &serde_json::Map<String, Value>) -> Result<Value> {
        self.client.invoke(&self.name, arguments).await
    }
}

/// Discover the server's tools and register each behind a remote proxy.
/// Returns the names registered, sorted for stable logging.
pub async fn register_remote_tools(
    registry: &mut ToolRegistry,
    client: Arc<CapabilityClient>,
) -> Result<Vec<String>> {
    let definitions = client.discover().await?;
    let mut names: Vec<String> = definitions.iter().map(|d| d.name.clone()).collect();
    names.sort();

    for definition in definitions {
        let executor = RemoteExecutor::new(client.clone(), definition.name.clone());
        registry.register(definition, Arc::new(executor));
    }

    tracing::info!(count = names.len(), "registered remote tools");
    Ok(names)
}
