//! # tether-runtime
//!
//! Runtime integrations for the tether orchestration core.
//!
//! - **Ollama oracle**: schema-constrained reasoning over a local Ollama
//!   instance
//! - **Capability client**: discovery and invocation of remote tool
//!   servers
//! - **File store**: JSON-per-thread persistence for single-process
//!   deployments
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_runtime::ollama::OllamaOracle;
//! use tether_runtime::store::FileThreadStore;
//!
//! let oracle = OllamaOracle::from_env();
//! let store = FileThreadStore::open("./threads").await?;
//! let agent = Agent::with_defaults(Arc::new(oracle), tools, Arc::new(store));
//! ```

pub mod capability;
pub mod ollama;
pub mod store;

pub use capability::{CapabilityClient, RemoteExecutor};
pub use ollama::{OllamaConfig, OllamaOracle};
pub use store::FileThreadStore;

// Re-export core types for convenience
pub use tether_core::{
    Agent, AgentConfig, AgentError, MemoryStore, Message, ReasoningOracle, Result, Role, Thread,
    ThreadId, ToolRegistry,
};
