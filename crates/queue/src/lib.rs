//! Job queue connecting the submission gateway to the dispatcher.
//!
//! The gateway only ever sends; dispatcher slots only ever receive. Nothing
//! else is shared between the two sides except the status store.
//!
//! - [`QueuedJob`] -- the message envelope (job id plus submission input).
//! - [`InMemoryJobQueue`] -- `tokio::sync::mpsc` backed, single process.
//! - [`RedisJobQueue`] -- durable Redis list (`LPUSH` / `BLMOVE`) with a
//!   processing list that holds each job until it is acknowledged.

pub mod config;
pub mod memory;
pub mod message;
pub mod redis_backend;

use async_trait::async_trait;

pub use config::QueueConfig;
pub use memory::InMemoryJobQueue;
pub use message::QueuedJob;
pub use redis_backend::RedisJobQueue;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Queue is closed")]
    Closed,

    #[error("Malformed queue message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A one-way, fire-and-forget job channel.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job to the queue. Success means the job is queued, not that
    /// it will succeed.
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError>;

    /// Wait until a job is available. `Ok(None)` means the queue was closed
    /// and drained.
    async fn receive(&self) -> Result<Option<QueuedJob>, QueueError>;

    /// Mark a received job as handled. Until then a durable backend keeps it
    /// aside, so a receive dropped mid-flight or a crashed worker does not
    /// lose it.
    async fn ack(&self, _job: &QueuedJob) -> Result<(), QueueError> {
        Ok(())
    }
}
