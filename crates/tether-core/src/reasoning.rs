//! Agent Loop
//!
//! Drives the step resolver repeatedly until a terminal state is reached,
//! dispatching tool execution and recording results. Every turn commits its
//! events to the memory store before the next turn starts, so a caller may
//! abandon the loop between turns and the thread stays valid and resumable.
//!
//! Resumption is an implicit loop re-entry: appending one more
//! `input-received` event and re-running the same entry point is the whole
//! contract. There is no saved continuation; the event log is the source
//! of truth.

use std::sync::Arc;

use thiserror::Error;

use crate::error::AgentError;
use crate::event::{
    ActionResultPayload, Event, EventKind, InvocationPayload, SuspendKind, SuspendPayload,
};
use crate::memory::MemoryStore;
use crate::oracle::ReasoningOracle;
use crate::resolver::{Decision, StepResolver};
use crate::thread::{Thread, ThreadId};
use crate::tool::ToolRegistry;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt framing every oracle request
    pub system_prompt: String,

    /// Maximum turns per loop invocation before giving up
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_turns: 10,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous agent. Your primary goal is to \
    fulfill the user's request. Carefully analyze the user's initial input and the results \
    of any previous tool executions, and select the appropriate tool from the available \
    list. If the user's request has been fully addressed, respond with 'done'. If you \
    require further input or clarification, respond with 'clarification'.";

/// State of one loop invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal for this invocation, not for the thread's life
    AwaitingHuman,
    /// Terminal, unrecoverable protocol/validation error
    Failed,
}

/// How a loop invocation ended (absent a failure)
#[derive(Clone, Debug, PartialEq)]
pub enum LoopOutcome {
    /// The task is complete; `awaiting_human` is false
    Completed { message: String },
    /// The thread is suspended on a `suspended-for-input` marker
    AwaitingHuman { message: String },
}

impl LoopOutcome {
    /// A completed loop stops while still `Running`; completion is not a
    /// suspension, so `AwaitingHuman` is never entered for it.
    pub fn state(&self) -> LoopState {
        match self {
            LoopOutcome::Completed { .. } => LoopState::Running,
            LoopOutcome::AwaitingHuman { .. } => LoopState::AwaitingHuman,
        }
    }
}

/// Failure report for a loop invocation: the taxonomy kind plus the event
/// index at which it occurred, sufficient to resume debugging from the
/// persisted thread alone.
#[derive(Error, Debug)]
#[error("agent loop failed at event {event_index}: {kind}")]
pub struct LoopError {
    pub kind: AgentError,
    pub event_index: usize,
}

impl LoopError {
    pub const fn state(&self) -> LoopState {
        LoopState::Failed
    }
}

type LoopResult<T> = std::result::Result<T, LoopError>;

/// The agent: oracle, tool registry, and memory store wired together.
///
/// All collaborators are injected; there are no ambient registries or
/// stores, so isolated instances per test case are cheap.
pub struct Agent {
    oracle: Arc<dyn ReasoningOracle>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn MemoryStore>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn MemoryStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            oracle,
            tools,
            store,
            config,
        }
    }

    pub fn with_defaults(
        oracle: Arc<dyn ReasoningOracle>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self::new(oracle, tools, store, AgentConfig::default())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &dyn MemoryStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Create a thread seeded with one input event, persist it, and run.
    pub async fn start(&self, input: impl Into<String>) -> LoopResult<(ThreadId, LoopOutcome)> {
        let thread = Thread::seeded(input);
        let id = thread.id.clone();
        self.persist(&thread).await?;
        let outcome = self.run(&id).await?;
        Ok((id, outcome))
    }

    /// Run the loop on an existing thread until a terminal state.
    pub async fn run(&self, thread_id: &ThreadId) -> LoopResult<LoopOutcome> {
        let mut thread = self.load(thread_id).await?;

        if thread.awaiting_human() {
            let message = thread
                .last_suspension()
                .map(|s| s.message)
                .unwrap_or_default();
            tracing::warn!(thread_id = %thread.id, "loop invoked while awaiting human input");
            return Ok(LoopOutcome::AwaitingHuman { message });
        }

        tracing::info!(thread_id = %thread.id, events = thread.len(), "starting agent loop");
        let resolver = StepResolver::new(
            self.oracle.as_ref(),
            self.tools.as_ref(),
            &self.config.system_prompt,
        );

        for _turn in 0..self.config.max_turns {
            let decision = match resolver.resolve(&mut thread).await {
                Ok(decision) => decision,
                Err(kind) => {
                    // Keep the failing decision in the persisted log
                    self.persist_best_effort(&thread).await;
                    return Err(self.fail(&thread, kind));
                }
            };
            self.persist(&thread).await?;

            match decision {
                Decision::Done { message } => {
                    tracing::info!(thread_id = %thread.id, "task complete");
                    return Ok(LoopOutcome::Completed { message });
                }
                Decision::ClarificationNeeded { message } => {
                    thread.append(suspend_event(SuspendKind::Clarification, &message, None));
                    self.persist(&thread).await?;
                    tracing::info!(thread_id = %thread.id, "suspended for clarification");
                    return Ok(LoopOutcome::AwaitingHuman { message });
                }
                Decision::ToolInvocation { name, arguments } => {
                    let invocation = InvocationPayload {
                        name,
                        arguments,
                        child_thread_id: None,
                    };

                    let needs_approval = self
                        .tools
                        .definition(&invocation.name)
                        .is_some_and(|d| d.requires_approval);
                    if needs_approval {
                        let message =
                            format!("Approval required to run tool '{}'", invocation.name);
                        thread.append(suspend_event(
                            SuspendKind::Approval,
                            &message,
                            Some(invocation),
                        ));
                        self.persist(&thread).await?;
                        tracing::info!(thread_id = %thread.id, "suspended for approval");
                        return Ok(LoopOutcome::AwaitingHuman { message });
                    }

                    self.dispatch(&mut thread, invocation).await?;
                    self.persist(&thread).await?;
                }
            }
        }

        Err(self.fail(&thread, AgentError::TurnLimit(self.config.max_turns)))
    }

    /// Append a human reply to a suspended thread and re-enter the loop.
    pub async fn resume_with_input(
        &self,
        thread_id: &ThreadId,
        input: impl Into<String>,
    ) -> LoopResult<LoopOutcome> {
        let mut thread = self.load(thread_id).await?;
        thread.append(Event::input(input));
        self.persist(&thread).await?;
        self.run(thread_id).await
    }

    /// Settle a pending approval suspension and re-enter the loop.
    ///
    /// On approval the held-back invocation is dispatched; on denial the
    /// denial is recorded as the action's result so the oracle can react.
    pub async fn resolve_approval(
        &self,
        thread_id: &ThreadId,
        approved: bool,
        comment: Option<&str>,
    ) -> LoopResult<LoopOutcome> {
        let mut thread = self.load(thread_id).await?;

        let pending = thread
            .last_suspension()
            .filter(|s| s.kind == SuspendKind::Approval)
            .and_then(|s| s.pending)
            .ok_or_else(|| {
                self.fail(
                    &thread,
                    AgentError::Config("thread is not awaiting approval".into()),
                )
            })?;

        if approved {
            self.dispatch(&mut thread, pending).await?;
        } else {
            // The denied invocation is still recorded, keeping every
            // action-result paired with an action-invoked event
            thread.append(Event::new(
                EventKind::ActionInvoked,
                serde_json::to_value(&pending).unwrap_or_default(),
            ));
            let output = format!(
                "user denied the operation with feedback: {}",
                comment.unwrap_or("none")
            );
            thread.append(action_result_event(&pending.name, false, output.into()));
        }

        self.persist(&thread).await?;
        self.run(thread_id).await
    }

    /// Invoke a tool and record `action-invoked` / `action-result`.
    ///
    /// Executor failures are recorded as a failed result and the loop keeps
    /// running; protocol errors abort the invocation.
    async fn dispatch(&self, thread: &mut Thread, invocation: InvocationPayload) -> LoopResult<()> {
        thread.append(Event::new(
            EventKind::ActionInvoked,
            serde_json::to_value(&invocation).map_err(|e| self.fail(thread, e.into()))?,
        ));

        match self
            .tools
            .execute(&invocation.name, &invocation.arguments)
            .await
        {
            Ok(output) => {
                thread.append(action_result_event(&invocation.name, true, output));
            }
            Err(err) if !err.is_fatal() => {
                tracing::warn!(thread_id = %thread.id, tool = %invocation.name, error = %err,
                    "tool execution failed, recording as observation");
                thread.append(action_result_event(
                    &invocation.name,
                    false,
                    err.to_string().into(),
                ));
            }
            Err(err) => {
                self.persist_best_effort(thread).await;
                return Err(self.fail(thread, err));
            }
        }
        Ok(())
    }

    async fn load(&self, thread_id: &ThreadId) -> LoopResult<Thread> {
        match self.store.get(thread_id).await {
            Ok(Some(thread)) => Ok(thread),
            Ok(None) => Err(LoopError {
                kind: AgentError::Store(format!("thread {thread_id} not found")),
                event_index: 0,
            }),
            Err(kind) => Err(LoopError {
                kind,
                event_index: 0,
            }),
        }
    }

    async fn persist(&self, thread: &Thread) -> LoopResult<()> {
        self.store
            .set(thread)
            .await
            .map_err(|kind| self.fail(thread, kind))
    }

    async fn persist_best_effort(&self, thread: &Thread) {
        if let Err(err) = self.store.set(thread).await {
            tracing::error!(thread_id = %thread.id, error = %err,
                "failed to persist thread on error path");
        }
    }

    fn fail(&self, thread: &Thread, kind: AgentError) -> LoopError {
        tracing::error!(thread_id = %thread.id, kind = kind.kind(),
            event_index = thread.last_index(), error = %kind, "agent loop failed");
        LoopError {
            kind,
            event_index: thread.last_index(),
        }
    }
}

fn suspend_event(kind: SuspendKind, message: &str, pending: Option<InvocationPayload>) -> Event {
    let payload = SuspendPayload {
        kind,
        message: message.into(),
        pending,
    };
    // SuspendPayload serialization cannot fail
    Event::new(
        EventKind::SuspendedForInput,
        serde_json::to_value(payload).unwrap_or_default(),
    )
}

fn action_result_event(name: &str, ok: bool, output: serde_json::Value) -> Event {
    let payload = ActionResultPayload {
        name: name.into(),
        ok,
        output,
    };
    Event::new(
        EventKind::ActionResult,
        serde_json::to_value(payload).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryThreadStore;
    use crate::test_support::{math_registry, ScriptedOracle};
    use crate::tool::ToolDefinition;
    use serde_json::json;

    fn agent(oracle: ScriptedOracle) -> Agent {
        Agent::with_defaults(
            Arc::new(oracle),
            Arc::new(math_registry()),
            Arc::new(InMemoryThreadStore::new()),
        )
    }

    fn kinds_without_bookkeeping(thread: &Thread) -> Vec<EventKind> {
        thread
            .events()
            .iter()
            .map(|e| e.kind)
            .filter(|k| *k != EventKind::DecisionRequested)
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_single_tool_then_done() {
        let oracle = ScriptedOracle::new()
            .select("add")
            .fill(json!({"a": 3.0, "b": 4.0}))
            .select_with_reason("done", "3 plus 4 is 7");
        let agent = agent(oracle);

        let (id, outcome) = agent.start("Calculate 3 plus 4").await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Completed {
                message: "3 plus 4 is 7".into()
            }
        );
        assert_eq!(outcome.state(), LoopState::Running);

        let thread = agent.store().get(&id).await.unwrap().unwrap();
        assert!(!thread.awaiting_human());
        assert_eq!(
            kinds_without_bookkeeping(&thread),
            vec![
                EventKind::InputReceived,
                EventKind::DecisionMade, // add
                EventKind::DecisionMade, // ToolInvocation{add, {3, 4}}
                EventKind::ActionInvoked,
                EventKind::ActionResult,
                EventKind::DecisionMade, // done
            ]
        );

        let result = thread
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        assert_eq!(result.payload["ok"], json!(true));
        assert_eq!(result.payload["output"], json!(7.0));
    }

    #[tokio::test]
    async fn test_scenario_clarification_then_resume() {
        let oracle = ScriptedOracle::new()
            .select_with_reason("clarification", "What should the divisor be?")
            .select("divide")
            .fill(json!({"numerator": 10.0, "divisor": 2.0}))
            .select("done");
        let agent = agent(oracle);

        let (id, outcome) = agent.start("divide something").await.unwrap();
        assert!(matches!(outcome, LoopOutcome::AwaitingHuman { .. }));

        let suspended = agent.store().get(&id).await.unwrap().unwrap();
        assert!(suspended.awaiting_human());
        assert_eq!(
            suspended.last().unwrap().kind,
            EventKind::SuspendedForInput
        );

        let outcome = agent
            .resume_with_input(&id, "divide 10 by 2")
            .await
            .unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed { .. }));

        let finished = agent.store().get(&id).await.unwrap().unwrap();
        assert!(!finished.awaiting_human());
        let result = finished
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        assert_eq!(result.payload["output"], json!(5.0));
    }

    #[tokio::test]
    async fn test_scenario_unknown_tool_fails_loop() {
        let oracle = ScriptedOracle::new().select("subtract");
        let agent = agent(oracle);

        let err = agent.start("subtract 4 from 3").await.unwrap_err();
        assert_eq!(err.state(), LoopState::Failed);
        assert!(matches!(err.kind, AgentError::UnknownTool(ref name) if name == "subtract"));

        // The failing decision event is persisted for postmortem
        let threads = agent.store().all().await.unwrap();
        assert_eq!(threads.len(), 1);
        let thread = &threads[0];
        let last = thread.last().unwrap();
        assert_eq!(last.kind, EventKind::DecisionMade);
        assert_eq!(last.payload["choice"], json!("subtract"));
        assert_eq!(err.event_index, thread.last_index());
    }

    #[tokio::test]
    async fn test_executor_error_is_soft() {
        let oracle = ScriptedOracle::new()
            .select("divide")
            .fill(json!({"numerator": 1.0, "divisor": 0.0}))
            .select_with_reason("clarification", "Division by zero; what divisor?");
        let agent = agent(oracle);

        let (id, outcome) = agent.start("divide 1 by 0").await.unwrap();
        // The loop survived the failed execution and asked for help
        assert!(matches!(outcome, LoopOutcome::AwaitingHuman { .. }));

        let thread = agent.store().get(&id).await.unwrap().unwrap();
        let result = thread
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        assert_eq!(result.payload["ok"], json!(false));
        assert!(result.payload["output"]
            .as_str()
            .unwrap()
            .contains("division by zero"));
    }

    #[tokio::test]
    async fn test_approval_gate_suspends_and_resumes() {
        let mut registry = math_registry();
        registry.register_fn(
            ToolDefinition::new("wipe", "Destructive cleanup").with_approval(),
            |_| Ok(json!("wiped")),
        );

        let oracle = ScriptedOracle::new()
            .select("wipe")
            .fill(json!({}))
            .select("done");
        let agent = Agent::with_defaults(
            Arc::new(oracle),
            Arc::new(registry),
            Arc::new(InMemoryThreadStore::new()),
        );

        let (id, outcome) = agent.start("wipe the workspace").await.unwrap();
        assert!(matches!(outcome, LoopOutcome::AwaitingHuman { .. }));

        let suspended = agent.store().get(&id).await.unwrap().unwrap();
        let suspension = suspended.last_suspension().unwrap();
        assert_eq!(suspension.kind, SuspendKind::Approval);
        assert_eq!(suspension.pending.unwrap().name, "wipe");

        let outcome = agent.resolve_approval(&id, true, None).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed { .. }));

        let finished = agent.store().get(&id).await.unwrap().unwrap();
        let result = finished
            .events()
            .iter()
            .find(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        assert_eq!(result.payload["output"], json!("wiped"));
    }

    #[tokio::test]
    async fn test_denied_approval_recorded_as_result() {
        let mut registry = math_registry();
        registry.register_fn(
            ToolDefinition::new("wipe", "Destructive cleanup").with_approval(),
            |_| Ok(json!("wiped")),
        );

        let oracle = ScriptedOracle::new()
            .select("wipe")
            .fill(json!({}))
            .select("done");
        let agent = Agent::with_defaults(
            Arc::new(oracle),
            Arc::new(registry),
            Arc::new(InMemoryThreadStore::new()),
        );

        let (id, _) = agent.start("wipe the workspace").await.unwrap();
        let outcome = agent
            .resolve_approval(&id, false, Some("not on a Friday"))
            .await
            .unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed { .. }));

        let thread = agent.store().get(&id).await.unwrap().unwrap();
        let result_index = thread
            .events()
            .iter()
            .position(|e| e.kind == EventKind::ActionResult)
            .unwrap();
        let result = &thread.events()[result_index];
        assert_eq!(result.payload["ok"], json!(false));
        assert!(result.payload["output"]
            .as_str()
            .unwrap()
            .contains("not on a Friday"));

        // The denied invocation is recorded right before its result
        let invoked = &thread.events()[result_index - 1];
        assert_eq!(invoked.kind, EventKind::ActionInvoked);
        assert_eq!(invoked.payload["name"], json!("wipe"));
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let oracle = ScriptedOracle::new()
            .select("add")
            .fill(json!({"a": 1.0, "b": 1.0}))
            .select("add")
            .fill(json!({"a": 2.0, "b": 2.0}));
        let agent = Agent::new(
            Arc::new(oracle),
            Arc::new(math_registry()),
            Arc::new(InMemoryThreadStore::new()),
            AgentConfig {
                max_turns: 2,
                ..AgentConfig::default()
            },
        );

        let err = agent.start("keep adding").await.unwrap_err();
        assert!(matches!(err.kind, AgentError::TurnLimit(2)));
    }
}
