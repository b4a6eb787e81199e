//! Error Types

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Orchestration error taxonomy
#[derive(Error, Debug)]
pub enum AgentError {
    /// Decision named a tool that is not in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments failed schema validation
    #[error("Invalid arguments for tool '{tool}': {}", violations.join(", "))]
    InvalidArguments {
        tool: String,
        violations: Vec<String>,
    },

    /// Oracle response violated the requested response shape
    #[error("Malformed decision: {0}")]
    MalformedDecision(String),

    /// A tool's own execution raised (recoverable, recorded as an action result)
    #[error("Executor error: {0}")]
    Executor(String),

    /// Memory store I/O failure
    #[error("Store error: {0}")]
    Store(String),

    /// Reasoning oracle transport/backend failure
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Loop exceeded its configured turn cap
    #[error("Turn limit ({0}) reached")]
    TurnLimit(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Protocol-level errors are fatal to the current loop invocation;
    /// executor errors become observations the oracle can react to.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AgentError::Executor(_))
    }

    /// Short taxonomy tag for failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::UnknownTool(_) => "unknown_tool",
            AgentError::InvalidArguments { .. } => "invalid_arguments",
            AgentError::MalformedDecision(_) => "malformed_decision",
            AgentError::Executor(_) => "executor_error",
            AgentError::Store(_) => "store_error",
            AgentError::Oracle(_) => "oracle_error",
            AgentError::TurnLimit(_) => "turn_limit",
            AgentError::Config(_) => "config_error",
            AgentError::Io(_) => "io_error",
            AgentError::Json(_) => "json_error",
            AgentError::Other(_) => "other",
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
