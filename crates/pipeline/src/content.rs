//! Content stage: turn a source document and free-form text into the
//! intermediate document artifact.
//!
//! The collaborator behind this stage answers with a loose JSON dictionary
//! that either names the generated file or carries an `error` key. Adapters
//! funnel that convention through [`interpret_content_response`] so the rest
//! of the pipeline only ever sees `Result<Artifact, PipelineError>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use docjob_core::types::JobId;
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::subprocess::{self, ProcessError};

/// Response key naming the generated intermediate file.
pub const ARTIFACT_PATH_KEY: &str = "tex_file_path";

/// Response key signalling a collaborator-side failure.
pub const ERROR_KEY: &str = "error";

/// What the content collaborator is asked to do.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRequest {
    pub job_id: JobId,
    pub source_locator: String,
    pub text: String,
    /// Auxiliary parameters passed through untouched.
    pub params: serde_json::Map<String, Value>,
}

impl ContentRequest {
    /// Build a request with the default auxiliary parameters
    /// (`current_year`).
    pub fn new(job_id: JobId, source_locator: String, text: String) -> Self {
        let mut params = serde_json::Map::new();
        params.insert(
            "current_year".into(),
            Value::String(chrono::Utc::now().year().to_string()),
        );
        Self {
            job_id,
            source_locator,
            text,
            params,
        }
    }
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &ContentRequest) -> Result<Artifact, PipelineError>;
}

/// Translate the collaborator's response dictionary into a stage result.
///
/// The presence of an `error` key wins over everything else, even when its
/// value is `null`. Otherwise the response must name an artifact path that
/// exists on disk.
pub fn interpret_content_response(response: &Value) -> Result<Artifact, PipelineError> {
    let obj = response.as_object().ok_or_else(|| {
        PipelineError::ContentGeneration("collaborator returned a non-object response".into())
    })?;

    if let Some(err) = obj.get(ERROR_KEY) {
        let message = match err {
            Value::String(s) => s.clone(),
            Value::Null => "content agent reported an error".to_string(),
            other => other.to_string(),
        };
        return Err(PipelineError::ContentGeneration(message));
    }

    let path = obj
        .get(ARTIFACT_PATH_KEY)
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::ContentGeneration(format!("response has no '{ARTIFACT_PATH_KEY}'"))
        })?;

    let artifact = Artifact::new(path);
    if !artifact.path().is_file() {
        return Err(PipelineError::ContentGeneration(format!(
            "{path} not found after content generation"
        )));
    }
    Ok(artifact)
}

// ---------------------------------------------------------------------------
// HTTP adapter
// ---------------------------------------------------------------------------

/// Calls a content agent service over HTTP.
///
/// Sends the [`ContentRequest`] as JSON to `endpoint` and interprets the
/// JSON reply. The agent must write the artifact to storage this process can
/// read (a shared volume).
pub struct HttpContentGenerator {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpContentGenerator {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, request: &ContentRequest) -> Result<Artifact, PipelineError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::ContentGeneration(format!("agent request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PipelineError::ContentGeneration(format!(
                "agent returned {}: {body}",
                status.as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            PipelineError::ContentGeneration(format!("agent response is not JSON: {e}"))
        })?;
        interpret_content_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Command adapter
// ---------------------------------------------------------------------------

/// Runs a local program as the content agent.
///
/// The request JSON is piped to stdin; the program prints its response
/// dictionary as JSON on stdout.
pub struct CommandContentGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandContentGenerator {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }
}

#[async_trait]
impl ContentGenerator for CommandContentGenerator {
    async fn generate(&self, request: &ContentRequest) -> Result<Artifact, PipelineError> {
        let input = serde_json::to_vec(request)
            .map_err(|e| PipelineError::ContentGeneration(format!("invalid request: {e}")))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = subprocess::run_command(&mut cmd, Some(&input), self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { elapsed_ms } => PipelineError::ContentGeneration(
                    format!("agent timed out after {elapsed_ms}ms"),
                ),
                other => PipelineError::ContentGeneration(format!("{}: {other}", self.program)),
            })?;

        if !output.success() {
            return Err(PipelineError::ContentGeneration(format!(
                "agent exited with code {}: {}",
                output.exit_code,
                output.tail(10)
            )));
        }

        let body: Value = serde_json::from_str(output.stdout.trim()).map_err(|e| {
            PipelineError::ContentGeneration(format!("agent output is not JSON: {e}"))
        })?;
        interpret_content_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::{header, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;

    use super::*;

    #[test]
    fn error_key_is_a_failure_even_with_a_path() {
        let response = json!({ "error": "LLM quota exceeded", "tex_file_path": "/tmp/x.tex" });
        assert_matches!(
            interpret_content_response(&response),
            Err(PipelineError::ContentGeneration(msg)) if msg == "LLM quota exceeded"
        );
    }

    #[test]
    fn missing_path_is_a_failure() {
        let response = json!({ "final_output": "done" });
        assert_matches!(
            interpret_content_response(&response),
            Err(PipelineError::ContentGeneration(msg)) if msg.contains("tex_file_path")
        );
    }

    #[test]
    fn nonexistent_file_is_a_failure() {
        let response = json!({ "tex_file_path": "/nonexistent/dir/tailored.tex" });
        assert_matches!(
            interpret_content_response(&response),
            Err(PipelineError::ContentGeneration(msg)) if msg.contains("not found")
        );
    }

    #[test]
    fn non_object_is_a_failure() {
        assert!(interpret_content_response(&json!(["a"])).is_err());
    }

    #[test]
    fn existing_file_becomes_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("tailored.tex");
        std::fs::write(&tex, "\\documentclass{article}").unwrap();

        let response = json!({ "tex_file_path": tex.to_str().unwrap() });
        let artifact = interpret_content_response(&response).unwrap();
        assert_eq!(artifact.path(), tex.as_path());
    }

    #[test]
    fn null_error_key_still_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("tailored.tex");
        std::fs::write(&tex, "x").unwrap();

        let response = json!({ "tex_file_path": tex.to_str().unwrap(), "error": null });
        assert_matches!(
            interpret_content_response(&response),
            Err(PipelineError::ContentGeneration(_))
        );
    }

    #[test]
    fn request_carries_current_year() {
        let request = ContentRequest::new(JobId::from("j"), "src".into(), "text".into());
        let year = chrono::Utc::now().year().to_string();
        assert_eq!(request.params["current_year"], Value::String(year));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_adapter_reads_error_dict_from_stdout() {
        let generator = CommandContentGenerator::new(
            "sh".into(),
            vec!["-c".into(), r#"cat > /dev/null; echo '{"error": "boom"}'"#.into()],
            Duration::from_secs(5),
        );
        let request = ContentRequest::new(JobId::from("j"), "src".into(), "text".into());
        assert_matches!(
            generator.generate(&request).await,
            Err(PipelineError::ContentGeneration(msg)) if msg == "boom"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_adapter_returns_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("out.tex");
        std::fs::write(&tex, "x").unwrap();
        let script = format!(
            r#"cat > /dev/null; echo '{{"tex_file_path": "{}"}}'"#,
            tex.display()
        );

        let generator =
            CommandContentGenerator::new("sh".into(), vec!["-c".into(), script], Duration::from_secs(5));
        let request = ContentRequest::new(JobId::from("j"), "src".into(), "text".into());
        let artifact = generator.generate(&request).await.unwrap();
        assert_eq!(artifact.path(), tex.as_path());
    }

    // -- HTTP adapter ---------------------------------------------------------

    /// Serve one canned reply on an ephemeral port and return its URL.
    async fn agent_replying(status: StatusCode, content_type: &'static str, body: String) -> String {
        let app = Router::new().route(
            "/generate",
            post(move || {
                let body = body.clone();
                async move { (status, [(header::CONTENT_TYPE, content_type)], body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/generate")
    }

    async fn generate_via(endpoint: String) -> Result<Artifact, PipelineError> {
        let generator = HttpContentGenerator::new(endpoint, Duration::from_secs(5));
        let request = ContentRequest::new(JobId::from("j"), "src".into(), "text".into());
        generator.generate(&request).await
    }

    #[tokio::test]
    async fn http_adapter_maps_non_2xx_to_content_error() {
        let url = agent_replying(StatusCode::BAD_GATEWAY, "text/plain", "upstream down".into()).await;
        assert_matches!(
            generate_via(url).await,
            Err(PipelineError::ContentGeneration(msg)) if msg == "agent returned 502: upstream down"
        );
    }

    #[tokio::test]
    async fn http_adapter_rejects_non_json_reply() {
        let url = agent_replying(StatusCode::OK, "text/html", "<html>oops</html>".into()).await;
        assert_matches!(
            generate_via(url).await,
            Err(PipelineError::ContentGeneration(msg)) if msg.contains("not JSON")
        );
    }

    #[tokio::test]
    async fn http_adapter_surfaces_error_dict() {
        let body = json!({ "error": "LLM quota exceeded" }).to_string();
        let url = agent_replying(StatusCode::OK, "application/json", body).await;
        assert_matches!(
            generate_via(url).await,
            Err(PipelineError::ContentGeneration(msg)) if msg == "LLM quota exceeded"
        );
    }

    #[tokio::test]
    async fn http_adapter_returns_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("out.tex");
        std::fs::write(&tex, "x").unwrap();
        let body = json!({ "tex_file_path": tex.to_str().unwrap() }).to_string();
        let url = agent_replying(StatusCode::OK, "application/json", body).await;

        let artifact = generate_via(url).await.unwrap();
        assert_eq!(artifact.path(), tex.as_path());
    }
}
