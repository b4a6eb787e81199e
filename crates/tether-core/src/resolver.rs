//! Step Resolver
//!
//! Each call to `resolve` is a bounded two-stage exchange with the oracle:
//! first a closed-choice selection over the registered tool names plus the
//! terminal literals, then (for a real tool) a schema-constrained argument
//! extraction. Selection and extraction have different failure modes and
//! different optimal framing, so each stage keeps its own minimal, stable
//! response contract.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::event::{DecisionStage, Event, EventKind, InvocationPayload, RequestPayload, SelectionPayload};
use crate::oracle::{ArgumentRequest, ReasoningOracle, SelectionRequest};
use crate::thread::Thread;
use crate::tool::{ToolDefinition, ToolRegistry};

/// The oracle's structured output for one step
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// Invoke a registered tool with extracted arguments
    ToolInvocation {
        name: String,
        arguments: serde_json::Map<String, Value>,
    },
    /// The task is complete
    Done { message: String },
    /// Human input is needed before the task can continue
    ClarificationNeeded { message: String },
}

pub(crate) const SELECTION_INSTRUCTION: &str = "Based on the conversation and tool results, \
    select the next tool to invoke, or respond with 'done' if the user's request has been \
    fully addressed, or 'clarification' if you require further input. Respond ONLY with \
    the tool name, 'done', or 'clarification'.";

pub(crate) const EXTRACTION_INSTRUCTION: &str = "You are an expert at extracting parameters \
    for tools. Considering the full conversation history and the most recent tool execution \
    result, provide ONLY the parameters declared in the schema. If the user's request refers \
    to 'the result' or otherwise implies using a previous result, take the values directly \
    from the most recent tool execution result.";

/// Runs the decision protocol against the oracle and the registry,
/// appending events to the thread as it goes.
pub struct StepResolver<'a> {
    oracle: &'a dyn ReasoningOracle,
    registry: &'a ToolRegistry,
    system_prompt: &'a str,
}

impl<'a> StepResolver<'a> {
    pub fn new(
        oracle: &'a dyn ReasoningOracle,
        registry: &'a ToolRegistry,
        system_prompt: &'a str,
    ) -> Self {
        Self {
            oracle,
            registry,
            system_prompt,
        }
    }

    /// Determine the next step for the thread.
    ///
    /// Appends `decision-requested` / `decision-made` events for each stage.
    /// A selection naming an unregistered tool fails with `UnknownTool`
    /// after the decision event is recorded, so the failing decision stays
    /// in the log for postmortem. Shape violations fail with
    /// `MalformedDecision`.
    pub async fn resolve(&self, thread: &mut Thread) -> Result<Decision> {
        let catalog = self.registry.definitions();
        let mut allowed = self.registry.names();
        allowed.push("done".into());
        allowed.push("clarification".into());

        // Stage 1: selection
        thread.append(Event::new(
            EventKind::DecisionRequested,
            serde_json::to_value(RequestPayload {
                stage: DecisionStage::Selection,
                tool: None,
            })?,
        ));

        let transcript = thread.transcript();
        let selection_instruction =
            format!("{}\n\n{}", self.system_prompt, SELECTION_INSTRUCTION);
        let selection = self
            .oracle
            .select_action(&SelectionRequest {
                instruction: &selection_instruction,
                catalog: &catalog,
                transcript: &transcript,
                allowed: &allowed,
            })
            .await?;

        let choice = selection.choice.trim().to_string();
        tracing::debug!(thread_id = %thread.id, choice = %choice, "action selected");

        // Record the raw selection before judging it, for postmortem
        thread.append(Event::new(
            EventKind::DecisionMade,
            serde_json::to_value(SelectionPayload {
                choice: choice.clone(),
                reason: selection.reason.clone(),
            })?,
        ));

        if choice.is_empty() {
            return Err(AgentError::MalformedDecision(
                "selection response contained no choice".into(),
            ));
        }

        match choice.as_str() {
            "done" => {
                return Ok(Decision::Done {
                    message: selection
                        .reason
                        .unwrap_or_else(|| "Task completed.".into()),
                });
            }
            "clarification" => {
                return Ok(Decision::ClarificationNeeded {
                    message: selection
                        .reason
                        .unwrap_or_else(|| "Clarification needed to proceed.".into()),
                });
            }
            _ => {}
        }

        let Some(definition) = self.registry.definition(&choice).cloned() else {
            return Err(AgentError::UnknownTool(choice));
        };

        // Stage 2: parameter filling
        thread.append(Event::new(
            EventKind::DecisionRequested,
            serde_json::to_value(RequestPayload {
                stage: DecisionStage::Arguments,
                tool: Some(definition.name.clone()),
            })?,
        ));

        let transcript = thread.transcript();
        let extraction_instruction =
            format!("{}\n\n{}", self.system_prompt, EXTRACTION_INSTRUCTION);
        let filled = self
            .oracle
            .fill_arguments(&ArgumentRequest {
                instruction: &extraction_instruction,
                catalog: &catalog,
                transcript: &transcript,
                tool: &definition,
            })
            .await?;

        let arguments = check_argument_shape(&definition, filled)?;

        thread.append(Event::new(
            EventKind::DecisionMade,
            serde_json::to_value(InvocationPayload {
                name: definition.name.clone(),
                arguments: arguments.clone(),
                child_thread_id: None,
            })?,
        ));

        tracing::debug!(thread_id = %thread.id, tool = %definition.name, "arguments filled");
        Ok(Decision::ToolInvocation {
            name: definition.name,
            arguments,
        })
    }
}

/// Enforce the exact declared parameter shape on a stage-2 response.
///
/// Extra fields, missing required fields, or type mismatches are protocol
/// violations: the oracle answered outside the requested constraint.
fn check_argument_shape(
    definition: &ToolDefinition,
    filled: Value,
) -> Result<serde_json::Map<String, Value>> {
    let Value::Object(arguments) = filled else {
        return Err(AgentError::MalformedDecision(format!(
            "argument response for '{}' is not an object",
            definition.name
        )));
    };

    for key in arguments.keys() {
        if !definition.parameters.iter().any(|p| &p.name == key) {
            return Err(AgentError::MalformedDecision(format!(
                "argument response for '{}' carries undeclared field '{key}'",
                definition.name
            )));
        }
    }

    for param in &definition.parameters {
        match arguments.get(&param.name) {
            None if param.required => {
                return Err(AgentError::MalformedDecision(format!(
                    "argument response for '{}' is missing required field '{}'",
                    definition.name, param.name
                )));
            }
            // Null only stands in for an omitted optional parameter
            Some(value) if (param.required || !value.is_null()) && !param.param_type.matches(value) => {
                return Err(AgentError::MalformedDecision(format!(
                    "argument response for '{}' has field '{}' of the wrong type",
                    definition.name, param.name
                )));
            }
            _ => {}
        }
    }

    Ok(arguments)
}
