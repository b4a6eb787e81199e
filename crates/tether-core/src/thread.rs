//! Task Threads
//!
//! A thread is the append-only event log of one task execution and the
//! durable working memory of the agent. It is only ever mutated by
//! appending events; replaying the log reproduces the execution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::event::{
    ActionResultPayload, Event, EventKind, InvocationPayload, SelectionPayload, SuspendPayload,
};
use crate::message::Message;

/// Schema version tag written into every persisted thread
pub const THREAD_SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    THREAD_SCHEMA_VERSION
}

/// Unique thread identifier, assigned at creation and never reused
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse an externally supplied id. Anything that is not a UUID is
    /// rejected, so untrusted ids never reach a store's file paths.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(|u| Self(u.to_string()))
            .map_err(|_| AgentError::Config(format!("invalid thread id '{s}'")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-owned thread metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThreadMetadata {
    /// User/owner ID
    pub user_id: Option<String>,

    /// Parent thread, set on sub-agent threads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<ThreadId>,

    /// Custom tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Extra key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A complete task execution log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    /// Unique identifier
    pub id: ThreadId,

    /// Ordered, append-only event sequence
    events: Vec<Event>,

    /// Caller-owned metadata
    #[serde(default)]
    pub metadata: ThreadMetadata,

    /// Persisted schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last append timestamp
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// Create a new empty thread with a fresh id
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ThreadId::new(),
            events: Vec::new(),
            metadata: ThreadMetadata::default(),
            version: THREAD_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a thread seeded with one input event
    pub fn seeded(input: impl Into<String>) -> Self {
        let mut thread = Self::new();
        thread.append(Event::input(input));
        thread
    }

    /// Append one event. The only mutation a thread supports.
    pub fn append(&mut self, event: Event) {
        self.events.push(event);
        self.updated_at = Utc::now();
    }

    /// All events, in append order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the most recently appended event
    pub fn last_index(&self) -> usize {
        self.events.len().saturating_sub(1)
    }

    /// True iff the most recent event is a suspension marker.
    ///
    /// A pure function of the last event's kind: appending any further
    /// `input-received` (or result) event makes it false again.
    pub fn awaiting_human(&self) -> bool {
        matches!(
            self.last().map(|e| e.kind),
            Some(EventKind::SuspendedForInput)
        )
    }

    /// The active suspension payload, if the thread is currently suspended
    pub fn last_suspension(&self) -> Option<SuspendPayload> {
        let last = self.last()?;
        if last.kind != EventKind::SuspendedForInput {
            return None;
        }
        serde_json::from_value(last.payload.clone()).ok()
    }

    /// Set a context value in the thread's metadata
    pub fn set_context(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        tracing::debug!(thread_id = %self.id, key = %key, "context updated");
        self.metadata.extra.insert(key, value);
    }

    /// Get a context value from the thread's metadata
    pub fn context(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.extra.get(key)
    }

    /// Structural sanity check over the event sequence
    pub fn validate(&self) -> bool {
        if self.events.is_empty() {
            tracing::warn!(thread_id = %self.id, "thread has no events");
            return false;
        }
        self.events.iter().all(|e| !e.payload.is_null())
    }

    /// Project the event log into an oracle-consumable transcript.
    ///
    /// `decision-requested` and `action-invoked` are internal bookkeeping
    /// and are elided so the same information is never shown twice.
    pub fn transcript(&self) -> Vec<Message> {
        let mut messages = Vec::new();

        for event in &self.events {
            match event.kind {
                EventKind::InputReceived => {
                    messages.push(Message::user(render_payload(&event.payload)));
                }
                EventKind::DecisionMade => {
                    messages.push(Message::assistant(render_decision(&event.payload)));
                }
                EventKind::ActionResult => {
                    let content = match serde_json::from_value::<ActionResultPayload>(
                        event.payload.clone(),
                    ) {
                        Ok(result) if result.ok => {
                            format!("Tool '{}' returned: {}", result.name, result.output)
                        }
                        Ok(result) => {
                            format!("Tool '{}' failed: {}", result.name, result.output)
                        }
                        Err(_) => format!("Tool execution result: {}", event.payload),
                    };
                    messages.push(Message::tool(content));
                }
                EventKind::SuspendedForInput => {
                    let content = serde_json::from_value::<SuspendPayload>(event.payload.clone())
                        .map_or_else(|_| event.payload.to_string(), |s| s.message);
                    messages.push(Message::assistant(content));
                }
                // Internal bookkeeping, elided from the projection
                EventKind::DecisionRequested | EventKind::ActionInvoked => {}
            }
        }

        messages
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

fn render_payload(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a `decision-made` payload as an assistant utterance: terminal
/// selections become the literal choice, tool selections a description.
fn render_decision(payload: &serde_json::Value) -> String {
    if let Ok(invocation) = serde_json::from_value::<InvocationPayload>(payload.clone()) {
        return format!(
            "Selected tool '{}' with arguments: {}",
            invocation.name,
            serde_json::Value::Object(invocation.arguments)
        );
    }
    if let Ok(selection) = serde_json::from_value::<SelectionPayload>(payload.clone()) {
        return selection.choice;
    }
    render_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SuspendKind;
    use serde_json::json;

    #[test]
    fn test_append_only_growth() {
        let mut thread = Thread::seeded("hello");
        let first = thread.events()[0].clone();

        thread.append(Event::new(EventKind::DecisionMade, json!({"choice": "done"})));
        thread.append(Event::input("more"));

        assert_eq!(thread.len(), 3);
        // Existing events are untouched by further appends
        assert_eq!(thread.events()[0].kind, first.kind);
        assert_eq!(thread.events()[0].payload, first.payload);
    }

    #[test]
    fn test_awaiting_human_tracks_last_event() {
        let mut thread = Thread::seeded("divide something");
        assert!(!thread.awaiting_human());

        let suspend = SuspendPayload {
            kind: SuspendKind::Clarification,
            message: "What is the divisor?".into(),
            pending: None,
        };
        thread.append(Event::new(
            EventKind::SuspendedForInput,
            serde_json::to_value(&suspend).unwrap(),
        ));
        assert!(thread.awaiting_human());
        assert_eq!(
            thread.last_suspension().unwrap().message,
            "What is the divisor?"
        );

        thread.append(Event::input("divide 10 by 2"));
        assert!(!thread.awaiting_human());
        assert!(thread.last_suspension().is_none());
    }

    #[test]
    fn test_round_trip_preserves_event_sequence() {
        let mut thread = Thread::seeded("Calculate 3 plus 4");
        thread.metadata.user_id = Some("tester".into());
        thread.set_context("channel", json!("cli"));
        thread.append(Event::new(
            EventKind::DecisionMade,
            json!({"choice": "add", "reason": "arithmetic request"}),
        ));
        thread.append(Event::new(
            EventKind::ActionResult,
            json!({"name": "add", "ok": true, "output": 7.0}),
        ));

        let json = serde_json::to_string(&thread).unwrap();
        let back: Thread = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, thread.id);
        assert_eq!(back.version, THREAD_SCHEMA_VERSION);
        assert_eq!(back.len(), thread.len());
        for (a, b) in back.events().iter().zip(thread.events()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.payload, b.payload);
        }
        assert_eq!(back.metadata.user_id.as_deref(), Some("tester"));
        assert_eq!(back.context("channel"), Some(&json!("cli")));
    }

    #[test]
    fn test_transcript_elides_bookkeeping_events() {
        let mut thread = Thread::seeded("Calculate 3 plus 4");
        thread.append(Event::new(
            EventKind::DecisionRequested,
            json!({"stage": "selection"}),
        ));
        thread.append(Event::new(
            EventKind::DecisionMade,
            json!({"choice": "add"}),
        ));
        thread.append(Event::new(
            EventKind::DecisionMade,
            json!({"name": "add", "arguments": {"a": 3.0, "b": 4.0}}),
        ));
        thread.append(Event::new(
            EventKind::ActionInvoked,
            json!({"name": "add", "arguments": {"a": 3.0, "b": 4.0}}),
        ));
        thread.append(Event::new(
            EventKind::ActionResult,
            json!({"name": "add", "ok": true, "output": 7.0}),
        ));

        let transcript = thread.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].role, crate::message::Role::User);
        assert_eq!(transcript[1].content, "add");
        assert!(transcript[2].content.contains("Selected tool 'add'"));
        assert!(transcript[3].content.contains("returned: 7.0"));
    }

    #[test]
    fn test_parse_rejects_non_uuid_ids() {
        let id = ThreadId::new();
        assert_eq!(ThreadId::parse(id.as_str()).unwrap(), id);

        assert!(ThreadId::parse("..%2F..%2Fanything").is_err());
        assert!(ThreadId::parse("../escape").is_err());
        assert!(ThreadId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_thread() {
        assert!(!Thread::new().validate());
        assert!(Thread::seeded("hi").validate());
    }
}
