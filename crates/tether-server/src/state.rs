//! Application State

use std::sync::Arc;

use tether_core::Agent;
use tether_runtime::OllamaOracle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The agent loop shared by every request
    pub agent: Arc<Agent>,

    /// Oracle handle kept separately for health probing
    pub oracle: Arc<OllamaOracle>,
}
