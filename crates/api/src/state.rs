use std::sync::Arc;

use weatherman_actions::WorkflowProvider;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Everything here is immutable after startup, so clones are cheap and
/// concurrent requests never contend.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Provider that runs the forecast workflow.
    pub provider: Arc<dyn WorkflowProvider>,
}
