//! Tool System
//!
//! Uniform catalog of invocable capabilities. Executors are registered at
//! setup/connect time and dispatched by name; whether a name is backed by a
//! local function or a proxy to a remote capability server is invisible
//! past the dispatch boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// JSON type accepted by a tool parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Whether a JSON value conforms to this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One parameter in a tool's schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    /// Accepted JSON type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Whether this parameter must be present
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Tool definition shown to the reasoning oracle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier within a registry
    pub name: String,

    /// Human-readable description (shown to the oracle)
    pub description: String,

    /// Parameter schema
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Whether dispatch must suspend for human approval first
    #[serde(default)]
    pub requires_approval: bool,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            requires_approval: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterSpec>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// Polymorphic capability interface: local functions and remote proxies
/// both expose one `invoke` operation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke the capability with validated arguments
    async fn invoke(&self, arguments: &serde_json::Map<String, Value>) -> Result<Value>;
}

/// Local executor adapting a plain function
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F> ToolExecutor for FnExecutor<F>
where
    F: Fn(&serde_json::Map<String, Value>) -> Result<Value> + Send + Sync,
{
    async fn invoke(&self, arguments: &serde_json::Map<String, Value>) -> Result<Value> {
        (self.0)(arguments)
    }
}

struct ToolEntry {
    definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool definition with its executor
    pub fn register(&mut self, definition: ToolDefinition, executor: Arc<dyn ToolExecutor>) {
        let name = definition.name.clone();
        self.tools.insert(
            name,
            ToolEntry {
                definition,
                executor,
            },
        );
    }

    /// Register a local function as a tool
    pub fn register_fn<F>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(&serde_json::Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(definition, Arc::new(FnExecutor(f)));
    }

    /// Look up a definition by name
    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|e| &e.definition)
    }

    /// Resolve a name to its executor
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolExecutor>> {
        self.tools
            .get(name)
            .map(|e| e.executor.clone())
            .ok_or_else(|| AgentError::UnknownTool(name.into()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All definitions, sorted by name for stable prompt rendering
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|e| e.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Sorted tool names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments against a tool's parameter schema
    pub fn validate_arguments(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<()> {
        let definition = self
            .definition(name)
            .ok_or_else(|| AgentError::UnknownTool(name.into()))?;

        let mut violations = Vec::new();

        for param in &definition.parameters {
            match arguments.get(&param.name) {
                None if param.required => {
                    violations.push(format!("missing required field '{}'", param.name));
                }
                // Null only stands in for an omitted optional parameter
                Some(value) if (param.required || !value.is_null()) && !param.param_type.matches(value) => {
                    violations.push(format!(
                        "field '{}' must be of type {:?}",
                        param.name, param.param_type
                    ));
                }
                _ => {}
            }
        }

        for key in arguments.keys() {
            if !definition.parameters.iter().any(|p| &p.name == key) {
                violations.push(format!("unexpected field '{key}'"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AgentError::InvalidArguments {
                tool: name.into(),
                violations,
            })
        }
    }

    /// Execute a tool call: validate, invoke, normalize.
    ///
    /// Executor failures are reported as `AgentError::Executor` so the loop
    /// can record them as observations instead of aborting.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Value> {
        let executor = self.resolve(name)?;
        self.validate_arguments(name, arguments)?;

        tracing::debug!(tool = %name, "executing tool");
        let raw = executor.invoke(arguments).await.map_err(|e| match e {
            AgentError::Executor(_) => e,
            other => AgentError::Executor(other.to_string()),
        })?;

        Ok(normalize_result(raw))
    }

    /// Render the catalog for inclusion in oracle instructions
    pub fn render_catalog(&self) -> String {
        let mut rendered = String::new();
        for definition in self.definitions() {
            rendered.push_str(&format!(
                "### {}\n{}\n",
                definition.name, definition.description
            ));
            if !definition.parameters.is_empty() {
                rendered.push_str("Parameters:\n");
                for param in &definition.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    rendered.push_str(&format!(
                        "- `{}` ({:?}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            rendered.push('\n');
        }
        rendered
    }
}

/// Normalize heterogeneous executor results into one canonical value.
///
/// Remote capability servers may answer with a multi-part shape holding
/// text parts and an optional structured payload; local executors return
/// plain values. Both collapse to a single JSON value here.
pub fn normalize_result(raw: Value) -> Value {
    let Value::Object(ref map) = raw else {
        return raw;
    };

    if let Some(structured) = map.get("structured_content") {
        if !structured.is_null() {
            return structured.clone();
        }
    }

    if let Some(Value::Array(parts)) = map.get("content") {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return Value::String(texts.join("\n"));
        }
    }

    raw
}
