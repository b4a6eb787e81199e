//! Thread Events
//!
//! Every step of a task execution is recorded as one immutable event.
//! Events carry a kind tag plus a kind-specific JSON payload; the typed
//! payload structs below are the canonical shapes written by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::thread::ThreadId;

/// Kind of a recorded event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Caller or human supplied input
    InputReceived,
    /// A decision was requested from the oracle (internal bookkeeping)
    DecisionRequested,
    /// The oracle produced a structured decision
    DecisionMade,
    /// A tool invocation was dispatched
    ActionInvoked,
    /// A tool invocation produced a result (or a recorded failure)
    ActionResult,
    /// The loop suspended waiting for human input
    SuspendedForInput,
}

/// One immutable record in a thread
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    pub kind: EventKind,

    /// Kind-specific structured payload
    pub payload: Value,

    /// Assigned at append time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Input event with a plain text payload
    pub fn input(text: impl Into<String>) -> Self {
        Self::new(EventKind::InputReceived, Value::String(text.into()))
    }
}

/// Which stage of the decision protocol a request belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    Selection,
    Arguments,
}

/// Payload of a `decision-requested` event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestPayload {
    pub stage: DecisionStage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// Payload of a stage-1 `decision-made` event: the raw selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionPayload {
    /// A registered tool name, `done`, or `clarification`
    pub choice: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of a stage-2 `decision-made` event and of `action-invoked`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvocationPayload {
    pub name: String,

    pub arguments: serde_json::Map<String, Value>,

    /// Set when the invoked action is a sub-agent delegation; the sole
    /// linkage mechanism between a parent thread and its child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_thread_id: Option<ThreadId>,
}

/// Payload of an `action-result` event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionResultPayload {
    pub name: String,

    /// False when the executor itself raised; the error text is in `output`
    pub ok: bool,

    pub output: Value,
}

/// Why the loop suspended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendKind {
    /// The oracle needs more information from the human
    Clarification,
    /// A side-effecting tool is waiting for human approval
    Approval,
}

/// Payload of a `suspended-for-input` event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuspendPayload {
    pub kind: SuspendKind,

    pub message: String,

    /// The invocation held back pending approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<InvocationPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&EventKind::SuspendedForInput).unwrap();
        assert_eq!(json, "\"suspended-for-input\"");
        let back: EventKind = serde_json::from_str("\"action-result\"").unwrap();
        assert_eq!(back, EventKind::ActionResult);
    }

    #[test]
    fn test_event_round_trip() {
        let event = Event::new(
            EventKind::ActionResult,
            serde_json::to_value(ActionResultPayload {
                name: "add".into(),
                ok: true,
                output: serde_json::json!(7.0),
            })
            .unwrap(),
        );

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, event.kind);
        assert_eq!(back.payload, event.payload);
        assert_eq!(back.timestamp, event.timestamp);
    }

    #[test]
    fn test_invocation_payload_omits_empty_link() {
        let payload = InvocationPayload {
            name: "add".into(),
            arguments: serde_json::Map::new(),
            child_thread_id: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("child_thread_id"));
    }
}
