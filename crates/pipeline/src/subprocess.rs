//! Shared subprocess runner for the stages that shell out.
//!
//! Spawns a prepared [`Command`], optionally feeds it stdin, captures
//! stdout/stderr, and enforces a timeout. The child is spawned with
//! `kill_on_drop(true)` so a timeout (or the job's own budget dropping the
//! future) never leaves it running.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (4 MiB).
const MAX_OUTPUT_BYTES: u64 = 4 * 1024 * 1024;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `-1` if the process was killed by a signal.
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The last `lines` non-empty lines of stdout and stderr, for error
    /// messages.
    pub fn tail(&self, lines: usize) -> String {
        let combined: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = combined.len().saturating_sub(lines);
        combined[start..].join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start process: {0}")]
    Spawn(std::io::Error),

    #[error("process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error while waiting for process: {0}")]
    Io(std::io::Error),
}

/// Run `cmd` to completion (or until `timeout`), returning its output.
pub async fn run_command(
    cmd: &mut Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    // The write runs beside `wait()` so a child that never reads its stdin
    // still hits the timeout.
    let stdin_task = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => {
            let bytes = bytes.to_vec();
            Some(tokio::spawn(async move {
                // If the process closes stdin early, its exit status tells the story.
                let _ = pipe.write_all(&bytes).await;
            }))
        }
        _ => None,
    };

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    if let Some(task) = stdin_task {
        task.abort();
    }

    match waited {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(e)) => Err(ProcessError::Io(e)),
        // `child` is dropped on return, which kills it.
        Err(_elapsed) => Err(ProcessError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run_command(&mut sh("echo hello; exit 3"), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn pipes_stdin() {
        let out = run_command(&mut sh("cat"), Some(b"{\"a\":1}"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout, "{\"a\":1}");
    }

    #[tokio::test]
    async fn times_out() {
        let result = run_command(&mut sh("sleep 30"), None, Duration::from_millis(200)).await;
        assert_matches!(result, Err(ProcessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unread_stdin_does_not_outlive_the_timeout() {
        let input = vec![b'x'; 4 * 1024 * 1024];
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_command(&mut sh("sleep 30"), Some(&input), Duration::from_millis(200)),
        )
        .await
        .expect("run_command honours its own timeout");
        assert_matches!(result, Err(ProcessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut cmd = Command::new("/definitely/not/a/program");
        let result = run_command(&mut cmd, None, Duration::from_secs(1)).await;
        assert_matches!(result, Err(ProcessError::Spawn(_)));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let out = ProcessOutput {
            stdout: "a\nb\n\nc\n".into(),
            stderr: "d\n".into(),
            exit_code: 1,
            duration_ms: 0,
        };
        assert_eq!(out.tail(2), "c\nd");
    }
}
