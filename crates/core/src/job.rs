//! Job status lifecycle and the persisted status record.
//!
//! ```text
//! Queued --> Running --> Completed
//!    |          |
//!    +----------+-----> Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. `Unknown` is never stored: the
//! query path synthesizes it when no record exists (never issued, or
//! expired).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long a status record survives after its last write (24 hours).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60 * 24);

/// Wall-clock budget for one job's whole pipeline (1 hour).
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Payload key carrying the failure message of a `failed` record.
pub const PAYLOAD_ERROR_KEY: &str = "error";

/// Payload key carrying a machine-readable failure category.
pub const PAYLOAD_REASON_KEY: &str = "reason";

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// No record found. Synthesized by queries, never written.
    Unknown,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a record in `self` may be overwritten by one in `next`.
    ///
    /// `Queued -> Failed` covers a job that could not be handed to the
    /// queue after its initial record was written.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but as a `Result`.
    pub fn check_transition(self, next: JobStatus) -> Result<(), CoreError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// The status record stored per job id.
///
/// Serialized as `{"status": "...", "payload": {...}}`; `payload` is omitted
/// for `queued` and `running`. Build records through the constructors so a
/// payload only ever accompanies a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl JobRecord {
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            payload: None,
        }
    }

    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            payload: None,
        }
    }

    /// A completed record carrying the stage outputs.
    pub fn completed(payload: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            payload: Some(payload),
        }
    }

    /// A failed record with `{"error": message}` as payload.
    pub fn failed(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            status: JobStatus::Failed,
            payload: Some(serde_json::json!({ PAYLOAD_ERROR_KEY: message })),
        }
    }

    /// A failed record that also names the failure category, as
    /// `{"error": message, "reason": reason}`.
    pub fn failed_because(reason: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            status: JobStatus::Failed,
            payload: Some(serde_json::json!({
                PAYLOAD_ERROR_KEY: message,
                PAYLOAD_REASON_KEY: reason,
            })),
        }
    }

    /// What queries answer when no record exists.
    pub fn unknown() -> Self {
        Self {
            status: JobStatus::Unknown,
            payload: None,
        }
    }

    /// The failure message of a `failed` record, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.payload_str(PAYLOAD_ERROR_KEY)
    }

    /// The failure category of a `failed` record, if one was recorded.
    pub fn failure_reason(&self) -> Option<&str> {
        self.payload_str(PAYLOAD_REASON_KEY)
    }

    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
