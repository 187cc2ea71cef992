pub mod health;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                submit (POST)
/// /jobs/{id}           status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}

/// Root-level paths kept for existing clients.
///
/// ```text
/// /start-job           submit (POST)
/// /job-status?job_id=  status (GET)
/// ```
pub fn legacy_routes() -> Router<AppState> {
    Router::new()
        .route("/start-job", post(handlers::jobs::submit_job))
        .route("/job-status", get(handlers::jobs::job_status))
}
