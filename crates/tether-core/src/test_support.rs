//! Test-only helpers: a scripted oracle and canned tool registries
//! for deterministic loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::oracle::{ArgumentRequest, ReasoningOracle, Selection, SelectionRequest};
use crate::tool::{ParamType, ParameterSpec, ToolDefinition, ToolRegistry};

/// Oracle that replays a pre-scripted sequence of answers.
pub struct ScriptedOracle {
    selections: Mutex<VecDeque<Selection>>,
    fills: Mutex<VecDeque<Value>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            selections: Mutex::new(VecDeque::new()),
            fills: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a stage-1 selection answer
    pub fn select(self, choice: &str) -> Self {
        self.selections.lock().unwrap().push_back(Selection {
            choice: choice.into(),
            reason: None,
        });
        self
    }

    /// Queue a stage-1 selection answer with a rationale
    pub fn select_with_reason(self, choice: &str, reason: &str) -> Self {
        self.selections.lock().unwrap().push_back(Selection {
            choice: choice.into(),
            reason: Some(reason.into()),
        });
        self
    }

    /// Queue a stage-2 argument answer
    pub fn fill(self, value: Value) -> Self {
        self.fills.lock().unwrap().push_back(value);
        self
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn select_action(&self, _request: &SelectionRequest<'_>) -> Result<Selection> {
        self.selections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Oracle("selection script exhausted".into()))
    }

    async fn fill_arguments(&self, _request: &ArgumentRequest<'_>) -> Result<Value> {
        self.fills
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Oracle("fill script exhausted".into()))
    }
}

/// Registry with `add` and `divide` tools over numeric arguments.
pub fn math_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register_fn(
        ToolDefinition::new("add", "Add two numbers").with_parameters(vec![
            ParameterSpec::required("a", ParamType::Number),
            ParameterSpec::required("b", ParamType::Number),
        ]),
        |args| {
            let a = args.get("a").and_then(Value::as_f64).unwrap_or(0.0);
            let b = args.get("b").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(json!(a + b))
        },
    );

    registry.register_fn(
        ToolDefinition::new("divide", "Divide a numerator by a divisor").with_parameters(vec![
            ParameterSpec::required("numerator", ParamType::Number),
            ParameterSpec::required("divisor", ParamType::Number),
        ]),
        |args| {
            let numerator = args.get("numerator").and_then(Value::as_f64).unwrap_or(0.0);
            let divisor = args.get("divisor").and_then(Value::as_f64).unwrap_or(0.0);
            if divisor == 0.0 {
                return Err(AgentError::Executor("division by zero".into()));
            }
            Ok(json!(numerator / divisor))
        },
    );

    registry
}
