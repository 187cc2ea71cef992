//! Queue-driven job dispatcher.
//!
//! `concurrency` worker slots each loop on [`JobQueue::receive`] until the
//! cancellation token fires or the queue closes. A slot owns its job from
//! the `running` write to the terminal write, and acknowledges it to the
//! queue only after that. Cancellation is only observed between jobs, so a
//! job in flight always gets its terminal status.

use std::sync::Arc;
use std::time::Duration;

use docjob_core::job::{JobRecord, JobStatus};
use docjob_core::types::JobId;
use docjob_pipeline::{JobContext, Pipeline, PipelineError};
use docjob_queue::{JobQueue, QueuedJob};
use docjob_store::StatusStore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Back-off after a failed `receive` before the slot polls again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Attempts at the terminal status write before the result is given up.
const TERMINAL_WRITE_ATTEMPTS: u32 = 3;

/// Pause between terminal write attempts.
const TERMINAL_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Outcome of a guarded status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Written,
    /// The stored record is in a state that does not allow the transition.
    Rejected { current: JobStatus },
    /// The store failed; already logged.
    StoreFailed,
}

/// Background job dispatcher.
///
/// Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn StatusStore>,
    pipeline: Arc<Pipeline>,
    concurrency: usize,
    job_timeout: Duration,
}

impl JobDispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn StatusStore>,
        pipeline: Arc<Pipeline>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            pipeline,
            concurrency: config.concurrency.max(1),
            job_timeout: config.job_timeout,
        }
    }

    /// Run all worker slots until `cancel` fires or the queue closes.
    ///
    /// Returns once every slot has finished its current job.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            concurrency = self.concurrency,
            job_timeout_secs = self.job_timeout.as_secs(),
            "Job dispatcher started",
        );

        let mut slots = JoinSet::new();
        for slot in 0..self.concurrency {
            let dispatcher = self.clone();
            let cancel = cancel.clone();
            slots.spawn(async move { dispatcher.slot_loop(slot, cancel).await });
        }

        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker slot terminated abnormally");
            }
        }

        tracing::info!("Job dispatcher stopped");
    }

    async fn slot_loop(&self, slot: usize, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(slot, "Worker slot shutting down");
                    break;
                }
                received = self.queue.receive() => received,
            };

            match received {
                Ok(Some(job)) => {
                    self.process(job.clone()).await;
                    if let Err(e) = self.queue.ack(&job).await {
                        tracing::warn!(
                            slot,
                            job_id = %job.job_id,
                            error = %e,
                            "Failed to acknowledge job",
                        );
                    }
                }
                Ok(None) => {
                    tracing::info!(slot, "Job queue closed, worker slot exiting");
                    break;
                }
                Err(e) => {
                    tracing::error!(slot, error = %e, "Failed to receive job");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    /// Execute one job end to end.
    ///
    /// Returns the terminal status that was recorded, or `None` when the job
    /// was skipped because it had already finished, or the terminal write
    /// did not go through. Never propagates a pipeline error.
    pub async fn process(&self, job: QueuedJob) -> Option<JobStatus> {
        let job_id = job.job_id.clone();

        match self.guarded_write(&job_id, JobRecord::running(), JobStatus::Queued).await {
            WriteOutcome::Rejected { current } if current.is_terminal() => {
                tracing::warn!(
                    job_id = %job_id,
                    status = %current,
                    "Job already finished, skipping duplicate delivery",
                );
                return None;
            }
            WriteOutcome::Rejected { current } => {
                tracing::warn!(
                    job_id = %job_id,
                    status = %current,
                    "Job redelivered while marked running, executing again",
                );
            }
            WriteOutcome::Written | WriteOutcome::StoreFailed => {}
        }

        tracing::info!(job_id = %job_id, "Job started");

        let ctx = JobContext {
            job_id: job_id.clone(),
            input: job.input,
        };
        let result = match tokio::time::timeout(self.job_timeout, self.pipeline.run(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                secs: self.job_timeout.as_secs(),
            }),
        };

        let record = match result {
            Ok(output) => {
                tracing::info!(
                    job_id = %job_id,
                    tex_url = %output.tex_url,
                    pdf_url = %output.pdf_url,
                    "Job completed",
                );
                JobRecord::completed(output.into_payload())
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    reason = e.reason(),
                    error = %e,
                    "Job failed",
                );
                JobRecord::failed_because(e.reason(), e.to_string())
            }
        };

        let status = record.status;
        let mut attempt = 1;
        loop {
            match self.guarded_write(&job_id, record.clone(), JobStatus::Running).await {
                WriteOutcome::Written => return Some(status),
                WriteOutcome::Rejected { current } => {
                    tracing::warn!(
                        job_id = %job_id,
                        status = %current,
                        discarded = %status,
                        "Job reached a terminal state elsewhere, result discarded",
                    );
                    return None;
                }
                WriteOutcome::StoreFailed if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(TERMINAL_WRITE_RETRY_DELAY).await;
                }
                WriteOutcome::StoreFailed => {
                    tracing::error!(
                        job_id = %job_id,
                        status = %status,
                        attempts = TERMINAL_WRITE_ATTEMPTS,
                        "Giving up on terminal status write",
                    );
                    return None;
                }
            }
        }
    }

    /// Write `record` unless the stored state forbids the transition.
    ///
    /// A missing or unreadable record is assumed to be in `assumed` state,
    /// the state this slot last wrote (or tried to write).
    async fn guarded_write(
        &self,
        job_id: &JobId,
        record: JobRecord,
        assumed: JobStatus,
    ) -> WriteOutcome {
        let current = match self.store.get(job_id).await {
            Ok(Some(current)) => current.status,
            Ok(None) => assumed,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    "Could not read current status, assuming it is unchanged",
                );
                assumed
            }
        };

        if let Err(e) = current.check_transition(record.status) {
            tracing::debug!(job_id = %job_id, error = %e, "Status write refused");
            return WriteOutcome::Rejected { current };
        }

        match self.store.set(job_id, &record).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    status = %record.status,
                    error = %e,
                    "Failed to write job status",
                );
                WriteOutcome::StoreFailed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
