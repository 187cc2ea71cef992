//! Submission input and its validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Body of a job submission request.
///
/// Both fields are optional at the wire level so that a missing field is
/// reported as a validation error (400) rather than a body rejection.
/// `pdf_url` is accepted as an older name of `source_locator`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitJob {
    #[serde(default, alias = "pdf_url")]
    pub source_locator: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Validated job input, threaded through the queue to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    pub source_locator: String,
    pub text: String,
}

impl SubmitJob {
    /// Check that both fields are present and not blank.
    pub fn validate(self) -> Result<JobInput, CoreError> {
        let source_locator = require_field(self.source_locator, "source_locator")?;
        let text = require_field(self.text, "text")?;
        Ok(JobInput {
            source_locator,
            text,
        })
    }
}

fn require_field(value: Option<String>, field: &str) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::Validation(format!(
            "source_locator and text are required (missing '{field}')"
        ))),
    }
}
