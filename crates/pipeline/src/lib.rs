//! The three-stage document pipeline.
//!
//! `content -> compile -> publish`, run strictly in order. The first stage
//! error aborts the run; nothing after it executes.

pub mod artifact;
pub mod compile;
pub mod config;
pub mod content;
pub mod error;
pub mod publish;
pub mod sinks;
pub mod subprocess;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docjob_core::submission::JobInput;
use docjob_core::types::JobId;
use serde_json::{json, Value};

pub use artifact::Artifact;
pub use compile::{Compiler, LatexCompiler};
pub use config::{ConfigError, PipelineConfig};
pub use content::{ContentGenerator, ContentRequest};
pub use error::PipelineError;
pub use publish::{ArtifactSink, PublishedArtifacts, Publisher, SinkError};

/// Payload key holding the intermediate document URL.
pub const TEX_URL_KEY: &str = "tex_url";

/// Payload key holding the final document URL.
pub const PDF_URL_KEY: &str = "pdf_url";

/// One job as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub input: JobInput,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub tex_url: String,
    pub pdf_url: String,
}

impl PipelineOutput {
    /// The `completed` record payload.
    pub fn into_payload(self) -> Value {
        json!({
            TEX_URL_KEY: self.tex_url,
            PDF_URL_KEY: self.pdf_url,
        })
    }
}

pub struct Pipeline {
    content: Arc<dyn ContentGenerator>,
    compiler: Arc<dyn Compiler>,
    publisher: Publisher,
    artifact_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        content: Arc<dyn ContentGenerator>,
        compiler: Arc<dyn Compiler>,
        publisher: Publisher,
    ) -> Self {
        Self {
            content,
            compiler,
            publisher,
            artifact_dir: None,
        }
    }

    /// Give each job its own `{dir}/{job_id}` working directory, passed to
    /// the content agent as `output_dir` and removed after the run.
    pub fn with_artifact_dir(mut self, dir: PathBuf) -> Self {
        self.artifact_dir = Some(dir);
        self
    }

    pub async fn run(&self, ctx: &JobContext) -> Result<PipelineOutput, PipelineError> {
        // Held across the stages so the directory also goes away when the
        // job timeout drops this future mid-stage.
        let job_dir = self
            .artifact_dir
            .as_ref()
            .map(|d| JobDir::new(ctx.job_id.clone(), d.join(ctx.job_id.as_str())));

        self.run_stages(ctx, job_dir.as_ref().map(JobDir::path)).await
    }

    async fn run_stages(
        &self,
        ctx: &JobContext,
        job_dir: Option<&Path>,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut request = ContentRequest::new(
            ctx.job_id.clone(),
            ctx.input.source_locator.clone(),
            ctx.input.text.clone(),
        );
        if let Some(dir) = job_dir {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PipelineError::ContentGeneration(format!("cannot create output directory: {e}"))
            })?;
            request
                .params
                .insert("output_dir".into(), Value::String(dir.display().to_string()));
        }

        tracing::info!(job_id = %ctx.job_id, stage = "content", "Stage started");
        let intermediate = self.content.generate(&request).await?;

        tracing::info!(
            job_id = %ctx.job_id,
            stage = "compile",
            input = %intermediate.display(),
            "Stage started",
        );
        let final_artifact = self.compiler.compile(&intermediate).await?;

        tracing::info!(job_id = %ctx.job_id, stage = "publish", "Stage started");
        let published = self.publisher.publish(&intermediate, &final_artifact).await?;

        Ok(PipelineOutput {
            tex_url: published.intermediate_url,
            pdf_url: published.final_url,
        })
    }
}

/// Per-job working directory, removed when dropped.
struct JobDir {
    job_id: JobId,
    path: PathBuf,
}

impl JobDir {
    fn new(job_id: JobId, path: PathBuf) -> Self {
        Self { job_id, path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    job_id = %self.job_id,
                    dir = %self.path.display(),
                    error = %e,
                    "Failed to remove job artifact directory",
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
