//! HTTP Handlers
//!
//! Thin JSON layer over the agent loop. Suspensions surface as
//! `awaiting_human` responses; the client settles them through the
//! response endpoint, which distinguishes clarification answers from
//! approval verdicts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use tether_core::reasoning::{LoopError, LoopOutcome};
use tether_core::thread::{Thread, ThreadId};
use tether_core::AgentError;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ollama_connected: bool,
    pub tool_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct StartThreadRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadStateResponse {
    pub thread_id: String,
    pub state: &'static str,
    pub message: String,
}

/// Settles a suspension: a free-text answer to a clarification, or a
/// verdict on a pending approval
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResumeRequest {
    Response {
        message: String,
    },
    Approval {
        approved: bool,
        #[serde(default)]
        comment: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub events: usize,
    pub awaiting_human: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn outcome_response(thread_id: &ThreadId, outcome: LoopOutcome) -> Json<ThreadStateResponse> {
    let (state, message) = match outcome {
        LoopOutcome::Completed { message } => ("completed", message),
        LoopOutcome::AwaitingHuman { message } => ("awaiting_human", message),
    };
    Json(ThreadStateResponse {
        thread_id: thread_id.to_string(),
        state,
        message,
    })
}

fn loop_error(e: LoopError) -> ApiError {
    let status = match e.kind {
        AgentError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("agent loop error: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.kind.kind().into(),
        }),
    )
}

fn store_error(e: AgentError) -> ApiError {
    tracing::error!("store error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.kind().into(),
        }),
    )
}

/// Parse a path segment into a thread id; anything that is not a UUID
/// is rejected before it can reach the store
fn parse_id(id: &str) -> Result<ThreadId, ApiError> {
    ThreadId::parse(id).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
                code: e.kind().into(),
            }),
        )
    })
}

fn not_found(id: &ThreadId) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("thread '{id}' not found"),
            code: "not_found".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama_connected = state.oracle.health_check().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ollama_connected,
        tool_count: state.agent.tools().len(),
    })
}

/// Start a new thread and run the loop until it completes or suspends
pub async fn start_thread(
    State(state): State<AppState>,
    Json(payload): Json<StartThreadRequest>,
) -> Result<Json<ThreadStateResponse>, ApiError> {
    let (thread_id, outcome) = state.agent.start(payload.message).await.map_err(loop_error)?;
    Ok(outcome_response(&thread_id, outcome))
}

/// Fetch a thread's full event log
pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Thread>, ApiError> {
    let thread_id = parse_id(&id)?;
    state
        .agent
        .store()
        .get(&thread_id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found(&thread_id))
}

/// List stored threads, most recently updated first
pub async fn list_threads(
    State(state): State<AppState>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    let threads = state.agent.store().all().await.map_err(store_error)?;
    let summaries = threads
        .iter()
        .map(|t| ThreadSummary {
            thread_id: t.id.to_string(),
            events: t.len(),
            awaiting_human: t.awaiting_human(),
            updated_at: t.updated_at,
        })
        .collect();
    Ok(Json(summaries))
}

/// Settle a suspension and re-enter the loop
pub async fn resume_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ResumeRequest>,
) -> Result<Json<ThreadStateResponse>, ApiError> {
    let thread_id = parse_id(&id)?;

    let exists = state
        .agent
        .store()
        .get(&thread_id)
        .await
        .map_err(store_error)?
        .is_some();
    if !exists {
        return Err(not_found(&thread_id));
    }

    let outcome = match payload {
        ResumeRequest::Response { message } => state
            .agent
            .resume_with_input(&thread_id, message)
            .await
            .map_err(loop_error)?,
        ResumeRequest::Approval { approved, comment } => state
            .agent
            .resolve_approval(&thread_id, approved, comment.as_deref())
            .await
            .map_err(loop_error)?,
    };

    Ok(outcome_response(&thread_id, outcome))
}
