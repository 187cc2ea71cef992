//! Submission and status lookup.
//!
//! The gateway never runs a job. It validates the request, records the job
//! as `queued`, hands it to the queue and returns the id straight away.

use std::sync::Arc;

use docjob_core::error::CoreError;
use docjob_core::job::JobRecord;
use docjob_core::submission::SubmitJob;
use docjob_core::types::JobId;
use docjob_queue::{JobQueue, QueuedJob};
use docjob_store::{StatusStore, StoreError};

/// Failure message recorded when the queue refuses a job.
pub const ENQUEUE_FAILED_MESSAGE: &str = "Job could not be queued";

pub struct JobGateway {
    store: Arc<dyn StatusStore>,
    queue: Arc<dyn JobQueue>,
}

impl JobGateway {
    pub fn new(store: Arc<dyn StatusStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Validate, record as `queued`, enqueue.
    ///
    /// A rejected submission leaves no record and enqueues nothing. If the
    /// queue refuses the job, the record is overwritten as `failed` so it is
    /// never left `queued` forever.
    pub async fn submit(&self, request: SubmitJob) -> Result<JobId, CoreError> {
        let input = request.validate()?;
        let job_id = JobId::generate();

        self.store
            .set(&job_id, &JobRecord::queued())
            .await
            .map_err(|e| CoreError::Internal(format!("failed to record job {job_id}: {e}")))?;

        if let Err(e) = self.queue.enqueue(QueuedJob::new(job_id.clone(), input)).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to enqueue job");
            if let Err(store_err) = self
                .store
                .set(&job_id, &JobRecord::failed(ENQUEUE_FAILED_MESSAGE))
                .await
            {
                tracing::error!(
                    job_id = %job_id,
                    error = %store_err,
                    "Failed to record enqueue failure",
                );
            }
            return Err(CoreError::Internal(format!("failed to enqueue job {job_id}: {e}")));
        }

        tracing::info!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// Current record for `job_id`, or an `unknown` record when none exists.
    pub async fn query(&self, job_id: &JobId) -> Result<JobRecord, StoreError> {
        Ok(self
            .store
            .get(job_id)
            .await?
            .unwrap_or_else(JobRecord::unknown))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use docjob_core::job::JobStatus;
    use docjob_queue::{InMemoryJobQueue, QueueError};
    use docjob_store::InMemoryStatusStore;

    use super::*;

    fn submission(source: &str, text: &str) -> SubmitJob {
        SubmitJob {
            source_locator: Some(source.into()),
            text: Some(text.into()),
        }
    }

    #[tokio::test]
    async fn submit_records_queued_and_enqueues() {
        let store = Arc::new(InMemoryStatusStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let gateway = JobGateway::new(store.clone(), queue.clone());

        let id = gateway
            .submit(submission("https://x/cv.pdf", "Backend role"))
            .await
            .unwrap();

        assert_eq!(id.as_str().len(), 32);
        assert_eq!(gateway.query(&id).await.unwrap().status, JobStatus::Queued);
        assert_eq!(queue.enqueued_count(), 1);
    }

    #[tokio::test]
    async fn invalid_submission_leaves_no_trace() {
        let store = Arc::new(InMemoryStatusStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let gateway = JobGateway::new(store.clone(), queue.clone());

        let result = gateway.submit(submission("https://x/cv.pdf", "  ")).await;

        assert_matches!(result, Err(CoreError::Validation(_)));
        assert!(store.is_empty().await);
        assert_eq!(queue.enqueued_count(), 0);
    }

    #[tokio::test]
    async fn unknown_id_reads_as_unknown() {
        let gateway = JobGateway::new(
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(InMemoryJobQueue::new()),
        );
        let record = gateway.query(&JobId::from("nope")).await.unwrap();
        assert_eq!(record, JobRecord::unknown());
    }

    struct RefusingQueue;

    #[async_trait]
    impl JobQueue for RefusingQueue {
        async fn enqueue(&self, _job: QueuedJob) -> Result<(), QueueError> {
            Err(QueueError::Backend("broker unreachable".into()))
        }

        async fn receive(&self) -> Result<Option<QueuedJob>, QueueError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn enqueue_failure_marks_job_failed() {
        let store = Arc::new(InMemoryStatusStore::new());
        let gateway = JobGateway::new(store.clone(), Arc::new(RefusingQueue));

        let result = gateway.submit(submission("https://x/cv.pdf", "Backend role")).await;
        assert_matches!(result, Err(CoreError::Internal(_)));

        let ids = store.ids().await;
        assert_eq!(ids.len(), 1);
        let record = store.get(&ids[0]).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error_message(), Some(ENQUEUE_FAILED_MESSAGE));
    }
}
