use std::sync::Arc;

use docjob_store::StatusStore;

use crate::gateway::JobGateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Submission and status lookups.
    pub gateway: Arc<JobGateway>,
    /// Status store, pinged by the health check.
    pub store: Arc<dyn StatusStore>,
}
