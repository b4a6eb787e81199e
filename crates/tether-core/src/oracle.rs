//! Reasoning Oracle Abstraction
//!
//! Defines a common interface for whatever backend turns a serialized
//! history into a structured decision, allowing the orchestration core
//! to work with any provider without code changes.
//!
//! The core depends only on this contract: each request carries the
//! instruction, the tool catalog, the transcript, and the response shape
//! constraint. A response that does not conform to the constraint is
//! surfaced by the resolver as `MalformedDecision`, never coerced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// Stage-1 request: pick the next action from a closed set of choices
#[derive(Clone, Debug, Serialize)]
pub struct SelectionRequest<'a> {
    /// System instruction framing the selection
    pub instruction: &'a str,

    /// All registered tool definitions (names + descriptions shown)
    pub catalog: &'a [ToolDefinition],

    /// Serialized history of the thread
    pub transcript: &'a [Message],

    /// The closed set of valid answers: registered tool names plus the
    /// literals `done` and `clarification`
    pub allowed: &'a [String],
}

/// The oracle's stage-1 answer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Selection {
    /// One of the allowed literals
    pub choice: String,

    /// Free-text rationale, recorded for auditing
    #[serde(default)]
    pub reason: Option<String>,
}

/// Stage-2 request: fill the chosen tool's parameters
#[derive(Clone, Debug, Serialize)]
pub struct ArgumentRequest<'a> {
    /// System instruction specialized for argument extraction
    pub instruction: &'a str,

    /// All registered tool definitions
    pub catalog: &'a [ToolDefinition],

    /// Serialized history of the thread
    pub transcript: &'a [Message],

    /// The chosen tool, whose parameter schema constrains the answer
    pub tool: &'a ToolDefinition,
}

/// Strategy trait for reasoning backends.
///
/// Implement this trait to add support for a new decision provider.
/// The orchestration core works exclusively through this interface.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Answer a closed-choice selection request
    async fn select_action(&self, request: &SelectionRequest<'_>) -> Result<Selection>;

    /// Answer a schema-constrained argument extraction request with a
    /// JSON object matching the tool's declared parameter shape
    async fn fill_arguments(&self, request: &ArgumentRequest<'_>) -> Result<serde_json::Value>;
}
