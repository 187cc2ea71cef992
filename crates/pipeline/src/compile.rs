//! Compilation stage: intermediate document in, final document out.
//!
//! The compiler runs inside a scratch directory that is removed when the
//! stage returns, whatever the outcome, so auxiliary files (`.aux`, `.log`,
//! `.out`, ...) never accumulate next to the artifacts. Only the final
//! document is copied back out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::subprocess::{self, ProcessError};

/// Default compiler program.
pub const DEFAULT_LATEX_PROGRAM: &str = "pdflatex";

/// Default number of compiler passes (two so cross references resolve).
pub const DEFAULT_LATEX_PASSES: u32 = 2;

/// Default per-pass timeout.
pub const DEFAULT_LATEX_TIMEOUT: Duration = Duration::from_secs(120);

/// Extension of the compiled output.
const OUTPUT_EXTENSION: &str = "pdf";

/// Log lines kept in a compilation error message.
const ERROR_TAIL_LINES: usize = 15;

#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source: &Artifact) -> Result<Artifact, PipelineError>;
}

/// Compiles a LaTeX source with `pdflatex` (or a compatible program).
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    program: String,
    args: Vec<String>,
    passes: u32,
    timeout: Duration,
}

impl LatexCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-interaction=nonstopmode".to_string()],
            passes: DEFAULT_LATEX_PASSES,
            timeout: DEFAULT_LATEX_TIMEOUT,
        }
    }

    /// Replace the arguments placed before the source file name.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_pass(&self, workdir: &Path, file_name: &str, pass: u32) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(file_name).current_dir(workdir);

        let output = subprocess::run_command(&mut cmd, None, self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn(err) => PipelineError::CompilationProcess(format!(
                    "failed to start {}: {err}",
                    self.program
                )),
                ProcessError::Timeout { elapsed_ms } => PipelineError::CompilationProcess(
                    format!("{} timed out after {elapsed_ms}ms", self.program),
                ),
                ProcessError::Io(err) => PipelineError::CompilationProcess(err.to_string()),
            })?;

        tracing::debug!(
            program = %self.program,
            pass,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Compiler pass finished",
        );

        if !output.success() {
            return Err(PipelineError::CompilationProcess(format!(
                "{} exited with code {}: {}",
                self.program,
                output.exit_code,
                output.tail(ERROR_TAIL_LINES)
            )));
        }
        Ok(())
    }
}

impl Default for LatexCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_LATEX_PROGRAM)
    }
}

/// Where the compiled document lands: next to the source, same stem.
fn output_path_for(source: &Path) -> PathBuf {
    source.with_extension(OUTPUT_EXTENSION)
}

#[async_trait]
impl Compiler for LatexCompiler {
    async fn compile(&self, source: &Artifact) -> Result<Artifact, PipelineError> {
        let source_path = source.path();
        if !source_path.is_file() {
            return Err(PipelineError::CompilationProcess(format!(
                "input artifact not found: {}",
                source.display()
            )));
        }

        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::CompilationProcess(format!("not a file path: {}", source.display()))
            })?;
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        // Dropping `workdir` deletes it and every auxiliary file inside.
        let workdir = tempfile::Builder::new()
            .prefix("docjob-compile-")
            .tempdir()
            .map_err(|e| {
                PipelineError::CompilationProcess(format!("cannot create working directory: {e}"))
            })?;

        tokio::fs::copy(source_path, workdir.path().join(&file_name))
            .await
            .map_err(|e| {
                PipelineError::CompilationProcess(format!("cannot stage input artifact: {e}"))
            })?;

        for pass in 1..=self.passes {
            self.run_pass(workdir.path(), &file_name, pass).await?;
        }

        let produced = workdir.path().join(format!("{stem}.{OUTPUT_EXTENSION}"));
        if !produced.is_file() {
            return Err(PipelineError::CompilationOutputMissing(format!(
                "{} reported success but produced no {stem}.{OUTPUT_EXTENSION}",
                self.program
            )));
        }

        let destination = output_path_for(source_path);
        tokio::fs::copy(&produced, &destination)
            .await
            .map_err(|e| {
                PipelineError::CompilationProcess(format!("cannot store compiled artifact: {e}"))
            })?;

        Ok(Artifact::new(destination))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use assert_matches::assert_matches;

    use super::*;

    /// Write an executable fake compiler; `$1` is the source file name and
    /// the working directory is the scratch dir.
    fn fake_compiler(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-latex.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn source_in(dir: &Path) -> Artifact {
        let path = dir.join("resume.tex");
        std::fs::write(&path, "\\documentclass{article}").unwrap();
        Artifact::new(path)
    }

    fn compiler(program: String) -> LatexCompiler {
        LatexCompiler::new(program)
            .with_args(vec![])
            .with_passes(1)
            .with_timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn successful_compile_returns_pdf_next_to_source() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let program = fake_compiler(
            tools.path(),
            r#"base="${1%.tex}"; echo aux > "$base.aux"; echo log > "$base.log"; echo pdf > "$base.pdf""#,
        );

        let output = compiler(program)
            .compile(&source_in(work.path()))
            .await
            .unwrap();

        assert_eq!(output.path(), work.path().join("resume.pdf").as_path());
        assert!(output.path().is_file());
        assert!(!work.path().join("resume.aux").exists());
        assert!(!work.path().join("resume.log").exists());
    }

    #[tokio::test]
    async fn zero_exit_without_output_is_output_missing() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let program = fake_compiler(tools.path(), "exit 0");

        let result = compiler(program).compile(&source_in(work.path())).await;
        assert_matches!(result, Err(PipelineError::CompilationOutputMissing(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_is_process_error() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let program = fake_compiler(tools.path(), r#"echo "! LaTeX Error: File not found."; exit 1"#);

        let result = compiler(program).compile(&source_in(work.path())).await;
        assert_matches!(
            result,
            Err(PipelineError::CompilationProcess(msg)) if msg.contains("LaTeX Error")
        );
        assert!(!work.path().join("resume.pdf").exists());
    }

    #[tokio::test]
    async fn missing_program_is_process_error() {
        let work = tempfile::tempdir().unwrap();
        let result = compiler("/no/such/pdflatex".into())
            .compile(&source_in(work.path()))
            .await;
        assert_matches!(result, Err(PipelineError::CompilationProcess(_)));
    }

    #[tokio::test]
    async fn missing_source_is_process_error() {
        let result = LatexCompiler::default()
            .compile(&Artifact::new("/nonexistent/resume.tex"))
            .await;
        assert_matches!(
            result,
            Err(PipelineError::CompilationProcess(msg)) if msg.contains("not found")
        );
    }

    #[tokio::test]
    async fn runs_every_pass() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let counter = tools.path().join("passes");
        let program = fake_compiler(
            tools.path(),
            &format!(
                r#"echo x >> "{}"; echo pdf > "${{1%.tex}}.pdf""#,
                counter.display()
            ),
        );

        compiler(program)
            .with_passes(2)
            .compile(&source_in(work.path()))
            .await
            .unwrap();

        let runs = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 2);
    }
}
