use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::compile::{LatexCompiler, DEFAULT_LATEX_PASSES, DEFAULT_LATEX_PROGRAM};
use crate::content::{CommandContentGenerator, ContentGenerator, HttpContentGenerator};
use crate::publish::{ArtifactSink, Publisher};
use crate::sinks::s3::DEFAULT_PRESIGN_EXPIRY;
use crate::sinks::{LocalSink, S3Sink};
use crate::Pipeline;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// How the content agent is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentAgent {
    Http { url: String },
    Command { program: String, args: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    S3,
    Local,
}

impl SinkKind {
    fn parse(var: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            _ => Err(ConfigError::Invalid {
                var,
                value: value.to_string(),
            }),
        }
    }
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub content_agent: ContentAgent,
    pub content_timeout: Duration,
    pub latex_program: String,
    pub latex_passes: u32,
    pub latex_timeout: Duration,
    /// Parent of the per-job directories handed to the content agent.
    pub artifact_dir: PathBuf,
    pub tex_sink: SinkKind,
    pub pdf_sink: SinkKind,
    pub s3_bucket: Option<String>,
    pub s3_presign_expiry: Duration,
    pub local_sink_dir: PathBuf,
    pub local_sink_base_url: String,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                       |
    /// |--------------------------|-------------------------------|
    /// | `CONTENT_AGENT_URL`      | (one of the two is required)  |
    /// | `CONTENT_AGENT_COMMAND`  | (program followed by args)    |
    /// | `CONTENT_TIMEOUT_SECS`   | `1800`                        |
    /// | `LATEX_PROGRAM`          | `pdflatex`                    |
    /// | `LATEX_PASSES`           | `2`                           |
    /// | `LATEX_TIMEOUT_SECS`     | `120`                         |
    /// | `ARTIFACT_DIR`           | `{tmp}/docjob`                |
    /// | `TEX_SINK` / `PDF_SINK`  | `local`                       |
    /// | `S3_BUCKET`              | (required when a sink is s3)  |
    /// | `S3_PRESIGN_EXPIRY_SECS` | `3600`                        |
    /// | `LOCAL_SINK_DIR`         | `./published`                 |
    /// | `LOCAL_SINK_BASE_URL`    | `http://localhost:8080/files` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let content_agent = match (get("CONTENT_AGENT_URL"), get("CONTENT_AGENT_COMMAND")) {
            (Some(url), _) => ContentAgent::Http { url },
            (None, Some(command)) => {
                let mut parts = command.split_whitespace().map(str::to_string);
                let program = parts.next().ok_or(ConfigError::Missing("CONTENT_AGENT_COMMAND"))?;
                ContentAgent::Command {
                    program,
                    args: parts.collect(),
                }
            }
            (None, None) => return Err(ConfigError::Missing("CONTENT_AGENT_URL or CONTENT_AGENT_COMMAND")),
        };

        let secs = |var: &'static str, default: u64| -> Result<Duration, ConfigError> {
            parse_or(get(var), var, default).map(Duration::from_secs)
        };

        let tex_sink = match get("TEX_SINK") {
            Some(v) => SinkKind::parse("TEX_SINK", &v)?,
            None => SinkKind::Local,
        };
        let pdf_sink = match get("PDF_SINK") {
            Some(v) => SinkKind::parse("PDF_SINK", &v)?,
            None => SinkKind::Local,
        };
        let s3_bucket = get("S3_BUCKET");
        if s3_bucket.is_none() && (tex_sink == SinkKind::S3 || pdf_sink == SinkKind::S3) {
            return Err(ConfigError::Missing("S3_BUCKET"));
        }

        Ok(Self {
            content_agent,
            content_timeout: secs("CONTENT_TIMEOUT_SECS", 1800)?,
            latex_program: get("LATEX_PROGRAM").unwrap_or_else(|| DEFAULT_LATEX_PROGRAM.into()),
            latex_passes: parse_or(get("LATEX_PASSES"), "LATEX_PASSES", DEFAULT_LATEX_PASSES)?,
            latex_timeout: secs("LATEX_TIMEOUT_SECS", 120)?,
            artifact_dir: get("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("docjob")),
            tex_sink,
            pdf_sink,
            s3_bucket,
            s3_presign_expiry: secs("S3_PRESIGN_EXPIRY_SECS", DEFAULT_PRESIGN_EXPIRY.as_secs())?,
            local_sink_dir: get("LOCAL_SINK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./published")),
            local_sink_base_url: get("LOCAL_SINK_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080/files".into()),
        })
    }

    /// Wire up the concrete stages described by this configuration.
    pub async fn build(&self) -> Result<Pipeline, ConfigError> {
        let content: Arc<dyn ContentGenerator> = match &self.content_agent {
            ContentAgent::Http { url } => {
                Arc::new(HttpContentGenerator::new(url.clone(), self.content_timeout))
            }
            ContentAgent::Command { program, args } => Arc::new(CommandContentGenerator::new(
                program.clone(),
                args.clone(),
                self.content_timeout,
            )),
        };

        let compiler = LatexCompiler::new(&self.latex_program)
            .with_passes(self.latex_passes)
            .with_timeout(self.latex_timeout);

        let s3_client = if self.tex_sink == SinkKind::S3 || self.pdf_sink == SinkKind::S3 {
            let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Some(aws_sdk_s3::Client::new(&aws))
        } else {
            None
        };

        let tex_sink = self.sink("tex", self.tex_sink, s3_client.as_ref())?;
        let pdf_sink = self.sink("pdf", self.pdf_sink, s3_client.as_ref())?;

        Ok(Pipeline::new(content, Arc::new(compiler), Publisher::new(tex_sink, pdf_sink))
            .with_artifact_dir(self.artifact_dir.clone()))
    }

    fn sink(
        &self,
        role: &str,
        kind: SinkKind,
        s3_client: Option<&aws_sdk_s3::Client>,
    ) -> Result<Arc<dyn ArtifactSink>, ConfigError> {
        match kind {
            SinkKind::Local => Ok(Arc::new(LocalSink::new(
                format!("local-{role}"),
                self.local_sink_dir.clone(),
                self.local_sink_base_url.clone(),
            ))),
            SinkKind::S3 => {
                let bucket = self.s3_bucket.clone().ok_or(ConfigError::Missing("S3_BUCKET"))?;
                let client = s3_client.cloned().ok_or(ConfigError::Missing("S3_BUCKET"))?;
                Ok(Arc::new(
                    S3Sink::new(format!("s3-{role}"), client, bucket)
                        .with_presign_expiry(self.s3_presign_expiry),
                ))
            }
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: v }),
    }
}
