//! # tether-core
//!
//! Event-sourced agent orchestration: an append-only conversation log
//! paired with a two-stage decision/dispatch state machine that can pause
//! for human input, resume deterministically, and spawn traceable child
//! executions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Agent Loop                            │
//! │  ┌──────────────┐  ┌─────────────┐  ┌────────────────────┐  │
//! │  │     Step     │  │    Tool     │  │  ReasoningOracle   │  │
//! │  │   Resolver   │──│   Registry  │──│    (Strategy)      │  │
//! │  └──────────────┘  └─────────────┘  └────────────────────┘  │
//! │          │ appends events                                   │
//! │  ┌──────────────┐            ┌────────────────────┐         │
//! │  │    Thread    │────────────│    MemoryStore     │         │
//! │  └──────────────┘  persists  └────────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ReasoningOracle` and `MemoryStore` traits let any decision backend
//! and any persistence backend plug in without changing the loop; the
//! thread's event log, not process memory, is the source of truth for
//! suspension and resumption.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod oracle;
pub mod reasoning;
pub mod resolver;
pub mod subagent;
pub mod thread;
pub mod tool;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AgentError, Result};
pub use event::{Event, EventKind, SuspendKind};
pub use memory::{InMemoryThreadStore, MemoryStore};
pub use message::{Message, Role};
pub use oracle::ReasoningOracle;
pub use reasoning::{Agent, AgentConfig, LoopError, LoopOutcome, LoopState};
pub use resolver::Decision;
pub use subagent::{HistorySeed, SubAgentSpawner};
pub use thread::{Thread, ThreadId, ThreadMetadata};
pub use tool::{ParamType, ParameterSpec, ToolDefinition, ToolExecutor, ToolRegistry};
