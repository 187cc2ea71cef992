use std::time::Duration;

use docjob_core::job::DEFAULT_JOB_TIMEOUT;

/// Dispatcher configuration loaded from environment variables.
///
/// The pipeline itself is configured separately by
/// [`PipelineConfig`](docjob_pipeline::PipelineConfig).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of jobs executed at the same time (default: `1`).
    pub concurrency: usize,
    /// Wall-clock budget for one job, all stages included (default: 1 h).
    pub job_timeout: Duration,
    /// How long shutdown waits for in-flight jobs (default: `30` s).
    pub shutdown_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `WORKER_CONCURRENCY`    | `1`     |
    /// | `JOB_TIMEOUT_SECS`      | `3600`  |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`    |
    pub fn from_env() -> Self {
        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let job_timeout_secs: u64 = std::env::var("JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_JOB_TIMEOUT.as_secs().to_string())
            .parse()
            .expect("JOB_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            concurrency: concurrency.max(1),
            job_timeout: Duration::from_secs(job_timeout_secs),
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
