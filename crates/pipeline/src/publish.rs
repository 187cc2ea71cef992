//! Publication stage: upload both artifacts, each to its own sink.
//!
//! Both uploads are driven together and each runs to completion. If either
//! fails the stage fails, even though the other upload may already be
//! publicly reachable; nothing is rolled back.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::error::PipelineError;

/// Default folder for the intermediate document.
pub const DEFAULT_INTERMEDIATE_FOLDER: &str = "latex";

/// Default folder for the final document.
pub const DEFAULT_FINAL_FOLDER: &str = "pdf";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// An external storage destination that hands back a retrievable URL.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Short name used in logs and failure messages.
    fn name(&self) -> &str;

    /// Upload `artifact` under `folder` and return a URL for it.
    async fn upload(&self, artifact: &Artifact, folder: &str) -> Result<String, SinkError>;
}

/// URLs of the published artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub intermediate_url: String,
    pub final_url: String,
}

pub struct Publisher {
    intermediate_sink: Arc<dyn ArtifactSink>,
    final_sink: Arc<dyn ArtifactSink>,
    intermediate_folder: String,
    final_folder: String,
}

impl Publisher {
    pub fn new(intermediate_sink: Arc<dyn ArtifactSink>, final_sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            intermediate_sink,
            final_sink,
            intermediate_folder: DEFAULT_INTERMEDIATE_FOLDER.to_string(),
            final_folder: DEFAULT_FINAL_FOLDER.to_string(),
        }
    }

    pub async fn publish(
        &self,
        intermediate: &Artifact,
        final_artifact: &Artifact,
    ) -> Result<PublishedArtifacts, PipelineError> {
        let (intermediate_result, final_result) = tokio::join!(
            self.intermediate_sink
                .upload(intermediate, &self.intermediate_folder),
            self.final_sink.upload(final_artifact, &self.final_folder),
        );

        match (intermediate_result, final_result) {
            (Ok(intermediate_url), Ok(final_url)) => Ok(PublishedArtifacts {
                intermediate_url,
                final_url,
            }),
            (Err(e), other) => {
                if other.is_ok() {
                    tracing::warn!(
                        sink = self.final_sink.name(),
                        "Final artifact uploaded but intermediate upload failed; upload is kept",
                    );
                }
                Err(publication_error(self.intermediate_sink.as_ref(), e))
            }
            (Ok(_), Err(e)) => {
                tracing::warn!(
                    sink = self.intermediate_sink.name(),
                    "Intermediate artifact uploaded but final upload failed; upload is kept",
                );
                Err(publication_error(self.final_sink.as_ref(), e))
            }
        }
    }
}

fn publication_error(sink: &dyn ArtifactSink, err: SinkError) -> PipelineError {
    PipelineError::Publication {
        sink: sink.name().to_string(),
        message: err.to_string(),
    }
}

/// Content type to declare for an artifact, by extension.
pub fn content_type_for(artifact: &Artifact) -> &'static str {
    match artifact.dotted_extension().as_str() {
        ".pdf" => "application/pdf",
        ".tex" | ".txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
