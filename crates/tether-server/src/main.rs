//! tether HTTP Server
//!
//! Axum-based server exposing the agent loop over a small REST API.
//! Threads are event logs; clients start them, read them back, and
//! settle suspensions through the response endpoint.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tether_core::tool::{ParamType, ParameterSpec, ToolDefinition, ToolRegistry};
use tether_core::{Agent, AgentError, InMemoryThreadStore, MemoryStore};
use tether_runtime::capability::{register_remote_tools, CapabilityClient};
use tether_runtime::{FileThreadStore, OllamaOracle};

use crate::handlers::{get_thread, health_check, list_threads, resume_thread, start_thread};
use crate::state::AppState;

fn number_arg(arguments: &serde_json::Map<String, serde_json::Value>, name: &str) -> f64 {
    arguments.get(name).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn demo_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    tools.register_fn(
        ToolDefinition::new("add", "Add two numbers").with_parameters(vec![
            ParameterSpec::required("a", ParamType::Number).with_description("First addend"),
            ParameterSpec::required("b", ParamType::Number).with_description("Second addend"),
        ]),
        |arguments| {
            let sum = number_arg(arguments, "a") + number_arg(arguments, "b");
            Ok(serde_json::json!(sum))
        },
    );

    tools.register_fn(
        ToolDefinition::new("multiply", "Multiply two numbers").with_parameters(vec![
            ParameterSpec::required("a", ParamType::Number).with_description("First factor"),
            ParameterSpec::required("b", ParamType::Number).with_description("Second factor"),
        ]),
        |arguments| {
            let product = number_arg(arguments, "a") * number_arg(arguments, "b");
            Ok(serde_json::json!(product))
        },
    );

    // Division is gated behind human approval to exercise the approval flow
    tools.register_fn(
        ToolDefinition::new("divide", "Divide one number by another")
            .with_parameters(vec![
                ParameterSpec::required("numerator", ParamType::Number),
                ParameterSpec::required("divisor", ParamType::Number),
            ])
            .with_approval(),
        |arguments| {
            let divisor = number_arg(arguments, "divisor");
            if divisor == 0.0 {
                return Err(AgentError::Executor("division by zero".into()));
            }
            Ok(serde_json::json!(number_arg(arguments, "numerator") / divisor))
        },
    );

    tools
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize the reasoning oracle
    let oracle = Arc::new(OllamaOracle::from_env());
    if oracle.health_check().await {
        tracing::info!("✓ Connected to Ollama");
    } else {
        tracing::warn!("⚠ Ollama not available - agent will fail");
        tracing::warn!("  Make sure Ollama is running: ollama serve");
    }

    // Local tools, plus any published by a capability server
    let mut tools = demo_tools();
    if let Ok(url) = std::env::var("CAPABILITY_URL") {
        let client = Arc::new(CapabilityClient::new(url));
        match register_remote_tools(&mut tools, client).await {
            Ok(names) => tracing::info!("✓ Remote capabilities: {}", names.join(", ")),
            Err(e) => tracing::warn!("⚠ Capability discovery failed: {}", e),
        }
    }

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Thread persistence: file-backed when a directory is configured
    let store: Arc<dyn MemoryStore> = match std::env::var("THREAD_STORE_DIR") {
        Ok(dir) => {
            tracing::info!("✓ File thread store at {}", dir);
            Arc::new(FileThreadStore::open(dir).await?)
        }
        Err(_) => {
            tracing::info!("Using in-memory thread store");
            Arc::new(InMemoryThreadStore::new())
        }
    };

    let agent = Arc::new(Agent::with_defaults(oracle.clone(), Arc::new(tools), store));

    let state = AppState { agent, oracle };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/thread", post(start_thread))
        .route("/threads", get(list_threads))
        .route("/thread/{id}", get(get_thread))
        .route("/thread/{id}/response", post(resume_thread))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 tether server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /thread               - Start a thread");
    tracing::info!("  GET  /threads              - List threads");
    tracing::info!("  GET  /thread/{{id}}          - Fetch a thread's event log");
    tracing::info!("  POST /thread/{{id}}/response - Settle a suspension");

    axum::serve(listener, app).await?;

    Ok(())
}
