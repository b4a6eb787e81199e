//! Sub-Agent Spawner
//!
//! Creates a child thread sharing the parent's memory store and links it
//! to the parent through the `child_thread_id` field of the parent's
//! `action-invoked` event. That embedded link is the sole parent/child
//! relation; the child thread is independently owned by the store and may
//! outlive or be queried independently of the parent.

use std::sync::Arc;

use serde_json::json;

use crate::error::AgentError;
use crate::event::{ActionResultPayload, Event, EventKind, InvocationPayload};
use crate::reasoning::{Agent, LoopError, LoopOutcome};
use crate::thread::{Thread, ThreadId};

/// How much of the parent's history the child starts with.
///
/// A deliberate caller policy, not a fixed behavior: a delegated task may
/// need the full conversation, a short digest, or nothing at all.
#[derive(Clone, Debug, Default)]
pub enum HistorySeed {
    /// The child starts from the task description alone
    #[default]
    Omitted,
    /// The parent's full transcript is injected as context input
    Full,
    /// A caller-provided digest is injected as context input
    Summarized(String),
}

/// Outcome of a delegation
#[derive(Clone, Debug)]
pub struct Delegation {
    pub child_thread_id: ThreadId,
    pub outcome: LoopOutcome,
}

/// Spawns child executions on an agent bound to the shared memory store.
pub struct SubAgentSpawner {
    agent: Arc<Agent>,
    seed: HistorySeed,
}

impl SubAgentSpawner {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            seed: HistorySeed::default(),
        }
    }

    pub fn with_seed(mut self, seed: HistorySeed) -> Self {
        self.seed = seed;
        self
    }

    /// Delegate a task to a child execution.
    ///
    /// The child thread is persisted before any processing begins, so a
    /// lookup by id never races with creation; the parent's `action-invoked`
    /// event carries the `child_thread_id` link before the child runs.
    pub async fn spawn(
        &self,
        parent_id: &ThreadId,
        task: &str,
    ) -> Result<Delegation, LoopError> {
        let store = self.agent.store();

        let mut parent = match store.get(parent_id).await {
            Ok(Some(thread)) => thread,
            Ok(None) => {
                return Err(LoopError {
                    kind: AgentError::Store(format!("thread {parent_id} not found")),
                    event_index: 0,
                });
            }
            Err(kind) => {
                return Err(LoopError {
                    kind,
                    event_index: 0,
                });
            }
        };

        // (1) fresh child thread, linked back through its metadata
        let mut child = Thread::new();
        child.metadata.parent_thread_id = Some(parent.id.clone());

        match &self.seed {
            HistorySeed::Omitted => {}
            HistorySeed::Full => {
                child.append(Event::input(format!(
                    "Context from the delegating agent:\n{}",
                    render_transcript(&parent)
                )));
            }
            HistorySeed::Summarized(digest) => {
                child.append(Event::input(format!(
                    "Context from the delegating agent:\n{digest}"
                )));
            }
        }
        child.append(Event::input(task));
        let child_id = child.id.clone();

        // (2) persist the child before any processing begins
        persist(store, &child).await?;

        // (3) record the delegation on the parent with the child link
        let invocation = InvocationPayload {
            name: "delegate".into(),
            arguments: json!({"task": task})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            child_thread_id: Some(child_id.clone()),
        };
        parent.append(Event::new(
            EventKind::ActionInvoked,
            serde_json::to_value(&invocation).unwrap_or_default(),
        ));
        persist(store, &parent).await?;

        tracing::info!(parent = %parent.id, child = %child_id, "spawned sub-agent");

        // (4) run the child loop on the shared store
        let outcome = self.agent.run(&child_id).await?;

        // (5) record the child's final result on the parent
        let (ok, message) = match &outcome {
            LoopOutcome::Completed { message } => (true, message.clone()),
            LoopOutcome::AwaitingHuman { message } => (false, message.clone()),
        };
        let result = ActionResultPayload {
            name: "delegate".into(),
            ok,
            output: json!({
                "message": message,
                "child_thread_id": child_id,
            }),
        };
        parent.append(Event::new(
            EventKind::ActionResult,
            serde_json::to_value(result).unwrap_or_default(),
        ));
        persist(store, &parent).await?;

        Ok(Delegation {
            child_thread_id: child_id,
            outcome,
        })
    }
}

async fn persist(
    store: &dyn crate::memory::MemoryStore,
    thread: &Thread,
) -> Result<(), LoopError> {
    store.set(thread).await.map_err(|kind| LoopError {
        kind,
        event_index: thread.last_index(),
    })
}

fn render_transcript(thread: &Thread) -> String {
    thread
        .transcript()
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryThreadStore;
    use crate::memory::MemoryStore;
    use crate::test_support::{math_registry, ScriptedOracle};

    #[tokio::test]
    async fn test_spawn_links_child_to_parent() {
        let store = Arc::new(InMemoryThreadStore::new());
        let parent = Thread::seeded("hash this string, then summarize");
        let parent_id = parent.id.clone();
        store.set(&parent).await.unwrap();

        let oracle = ScriptedOracle::new()
            .select("add")
            .fill(json!({"a": 1.0, "b": 2.0}))
            .select_with_reason("done", "delegated sum is 3");
        let agent = Arc::new(Agent::with_defaults(
            Arc::new(oracle),
            Arc::new(math_registry()),
            store.clone(),
        ));

        let delegation = SubAgentSpawner::new(agent)
            .spawn(&parent_id, "add 1 and 2")
            .await
            .unwrap();
        assert!(matches!(delegation.outcome, LoopOutcome::Completed { .. }));

        // The link in the parent's action-invoked payload resolves to an
        // independently stored child thread
        let parent = store.get(&parent_id).await.unwrap().unwrap();
        let invoked = parent
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionInvoked)
            .unwrap();
        let payload: InvocationPayload =
            serde_json::from_value(invoked.payload.clone()).unwrap();
        let linked = payload.child_thread_id.unwrap();
        assert_eq!(linked, delegation.child_thread_id);

        let child = store.get(&linked).await.unwrap().unwrap();
        assert_eq!(child.metadata.parent_thread_id.as_ref(), Some(&parent_id));
        assert!(!child.awaiting_human());

        // The child's final result landed on the parent
        let result = parent
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        assert_eq!(result.payload["ok"], json!(true));
        assert_eq!(
            result.payload["output"]["message"],
            json!("delegated sum is 3")
        );
    }

    #[tokio::test]
    async fn test_full_seed_injects_parent_transcript() {
        let store = Arc::new(InMemoryThreadStore::new());
        let parent = Thread::seeded("the magic number is 42");
        let parent_id = parent.id.clone();
        store.set(&parent).await.unwrap();

        let oracle = ScriptedOracle::new().select_with_reason("done", "nothing to do");
        let agent = Arc::new(Agent::with_defaults(
            Arc::new(oracle),
            Arc::new(math_registry()),
            store.clone(),
        ));

        let delegation = SubAgentSpawner::new(agent)
            .with_seed(HistorySeed::Full)
            .spawn(&parent_id, "recall the magic number")
            .await
            .unwrap();

        let child = store
            .get(&delegation.child_thread_id)
            .await
            .unwrap()
            .unwrap();
        let first = child.events().first().unwrap();
        assert_eq!(first.kind, EventKind::InputReceived);
        assert!(first
            .payload
            .as_str()
            .unwrap()
            .contains("the magic number is 42"));
    }
}
