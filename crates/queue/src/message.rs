use chrono::{DateTime, Utc};
use docjob_core::submission::JobInput;
use docjob_core::types::JobId;
use serde::{Deserialize, Serialize};

/// A job waiting for a dispatcher slot.
///
/// Carries the submission input, which the status record never does: the
/// pipeline reads its parameters from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub input: JobInput,
    /// When the gateway enqueued the job (UTC).
    pub enqueued_at: DateTime<Utc>,
    /// Raw message as popped from a durable backend, used to acknowledge it.
    #[serde(skip)]
    pub(crate) receipt: Option<String>,
}

impl QueuedJob {
    pub fn new(job_id: JobId, input: JobInput) -> Self {
        Self {
            job_id,
            input,
            enqueued_at: Utc::now(),
            receipt: None,
        }
    }
}
