//! Ollama Reasoning Oracle
//!
//! Implementation of `ReasoningOracle` against the Ollama `/api/chat`
//! endpoint. Each request constrains the response with a JSON schema via
//! the `format` parameter, so stage-1 answers are a closed choice and
//! stage-2 answers match the tool's declared parameter shape; anything
//! else comes back as `MalformedDecision`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use tether_core::error::{AgentError, Result};
use tether_core::message::{Message, Role};
use tether_core::oracle::{ArgumentRequest, ReasoningOracle, Selection, SelectionRequest};
use tether_core::tool::{ParamType, ToolDefinition};

/// Ollama oracle configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used for both decision stages
    pub model: String,

    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("OLLAMA_HOST").unwrap_or(defaults.host),
            port: std::env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("OLLAMA_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Reasoning oracle backed by a local Ollama instance
pub struct OllamaOracle {
    http: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaOracle {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    pub fn from_config(config: OllamaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    fn base_url(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Check that the Ollama instance is reachable
    pub async fn health_check(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/tags", self.base_url()))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    /// One schema-constrained chat call; returns the raw answer text
    async fn chat(&self, messages: Vec<Value>, format: Value) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "format": format,
            "options": {"temperature": 0.0},
        });

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Oracle(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Oracle(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Oracle(e.to_string()))?;
        Ok(parsed.message.content)
    }

    /// Build the chat message list: system instruction + catalog, then
    /// the serialized history (tool observations appear as user context)
    fn build_messages(instruction: &str, catalog: &[ToolDefinition], transcript: &[Message]) -> Vec<Value> {
        let mut system = instruction.to_string();
        if !catalog.is_empty() {
            system.push_str("\n\nAvailable tools:\n");
            system.push_str(&render_catalog(catalog));
        }

        let mut messages = vec![json!({"role": "system", "content": system})];
        for message in transcript {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "user",
            };
            messages.push(json!({"role": role, "content": message.content}));
        }
        messages
    }
}

#[async_trait]
impl ReasoningOracle for OllamaOracle {
    async fn select_action(&self, request: &SelectionRequest<'_>) -> Result<Selection> {
        let format = json!({
            "type": "object",
            "properties": {
                "choice": {"type": "string", "enum": request.allowed},
                "reason": {"type": "string"},
            },
            "required": ["choice"],
        });

        let messages = Self::build_messages(request.instruction, request.catalog, request.transcript);
        let content = self.chat(messages, format).await?;

        serde_json::from_str(&content).map_err(|e| {
            AgentError::MalformedDecision(format!("selection response was not valid: {e}"))
        })
    }

    async fn fill_arguments(&self, request: &ArgumentRequest<'_>) -> Result<Value> {
        let messages = Self::build_messages(request.instruction, request.catalog, request.transcript);
        let content = self
            .chat(messages, parameter_schema(request.tool))
            .await?;

        serde_json::from_str(&content).map_err(|e| {
            AgentError::MalformedDecision(format!("argument response was not valid JSON: {e}"))
        })
    }
}

fn render_catalog(catalog: &[ToolDefinition]) -> String {
    catalog
        .iter()
        .map(|def| format!("- {}: {}", def.name, def.description))
        .collect::<Vec<_>>()
        .join("\n")
}

const fn schema_type(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "string",
        ParamType::Number => "number",
        ParamType::Integer => "integer",
        ParamType::Boolean => "boolean",
        ParamType::Array => "array",
        ParamType::Object => "object",
    }
}

/// JSON schema constraining a stage-2 answer to the tool's parameters
fn parameter_schema(tool: &ToolDefinition) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in &tool.parameters {
        properties.insert(
            param.name.clone(),
            json!({
                "type": schema_type(param.param_type),
                "description": param.description,
            }),
        );
        if param.required {
            required.push(param.name.clone());
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::tool::ParameterSpec;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_parameter_schema_shape() {
        let tool = ToolDefinition::new("add", "Add two numbers").with_parameters(vec![
            ParameterSpec::required("a", ParamType::Number),
            ParameterSpec::optional("precision", ParamType::Integer),
        ]);

        let schema = parameter_schema(&tool);
        assert_eq!(schema["properties"]["a"]["type"], json!("number"));
        assert_eq!(schema["properties"]["precision"]["type"], json!("integer"));
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn test_messages_carry_catalog_and_transcript() {
        let catalog = vec![ToolDefinition::new("add", "Add two numbers")];
        let transcript = vec![
            Message::user("Calculate 3 plus 4"),
            Message::tool("Tool 'add' returned: 7.0"),
        ];

        let messages = OllamaOracle::build_messages("Pick a tool.", &catalog, &transcript);
        assert_eq!(messages.len(), 3);
        assert!(messages[0]["content"]
            .as_str()
            .unwrap()
            .contains("add: Add two numbers"));
        assert_eq!(messages[2]["role"], json!("user"));
    }
}
