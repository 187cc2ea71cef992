//! Handlers for job submission and status polling.
//!
//! The same two operations are served under `/api/v1/jobs` and under the
//! older `/start-job` and `/job-status` paths.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docjob_core::job::{JobRecord, JobStatus};
use docjob_core::submission::SubmitJob;
use docjob_core::types::JobId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body of an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    pub job_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs (also POST /start-job)
///
/// Returns 202 with the new job id. The job is only queued; poll the status
/// endpoint for the outcome.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJob>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let job_id = state.gateway.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    lookup(&state, JobId::from(id)).await
}

/// GET /job-status?job_id=...
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<JobStatusQuery>,
) -> AppResult<Response> {
    let id = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("job_id is required".into()))?;
    lookup(&state, JobId::from(id)).await
}

/// 200 with the stored record, or 404 with `{"status": "unknown"}`.
async fn lookup(state: &AppState, job_id: JobId) -> AppResult<Response> {
    let record: JobRecord = state.gateway.query(&job_id).await?;
    let status = if record.status == JobStatus::Unknown {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    Ok((status, Json(record)).into_response())
}
