//! In-process job queue backed by an unbounded `tokio::sync::mpsc` channel.
//!
//! Any number of dispatcher slots may call [`receive`](JobQueue::receive)
//! concurrently; they take turns on the shared receiver and each job is
//! delivered to exactly one of them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::QueuedJob;
use crate::{JobQueue, QueueError};

pub struct InMemoryJobQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>,
    enqueued: AtomicUsize,
    acked: AtomicUsize,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            enqueued: AtomicUsize::new(0),
            acked: AtomicUsize::new(0),
        }
    }

    /// Total number of jobs ever accepted by [`enqueue`](JobQueue::enqueue).
    pub fn enqueued_count(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Number of received jobs acknowledged so far.
    pub fn acked_count(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs. Receivers drain what is buffered, then see `None`.
    pub fn close(&self) {
        let mut sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sender.take();
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;
        sender.send(job).map_err(|_| QueueError::Closed)?;
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<QueuedJob>, QueueError> {
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn ack(&self, _job: &QueuedJob) -> Result<(), QueueError> {
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use docjob_core::submission::JobInput;
    use docjob_core::types::JobId;

    use super::*;

    fn job(id: &str) -> QueuedJob {
        QueuedJob::new(
            JobId::from(id),
            JobInput {
                source_locator: "https://x/cv.pdf".into(),
                text: "jd".into(),
            },
        )
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job("a")).await.unwrap();
        queue.enqueue(job("b")).await.unwrap();

        assert_eq!(queue.receive().await.unwrap().unwrap().job_id.as_str(), "a");
        assert_eq!(queue.receive().await.unwrap().unwrap().job_id.as_str(), "b");
        assert_eq!(queue.enqueued_count(), 2);
    }

    #[tokio::test]
    async fn acks_are_counted() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job("a")).await.unwrap();

        let received = queue.receive().await.unwrap().unwrap();
        assert_eq!(queue.acked_count(), 0);
        queue.ack(&received).await.unwrap();
        assert_eq!(queue.acked_count(), 1);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(job("a")).await.unwrap();
        queue.close();

        assert!(matches!(queue.enqueue(job("b")).await, Err(QueueError::Closed)));
        assert!(queue.receive().await.unwrap().is_some());
        assert!(queue.receive().await.unwrap().is_none());
    }
}
