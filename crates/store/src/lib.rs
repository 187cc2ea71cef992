//! Job status store.
//!
//! One JSON record per job id, overwritten whole on every write, expiring a
//! fixed retention window after the last write. Expiry is the only way a
//! record disappears.
//!
//! - [`InMemoryStatusStore`] -- process-local map with an injected clock.
//! - [`RedisStatusStore`] -- `SET job:<id> <json> EX <ttl>`.

pub mod config;
pub mod memory;
pub mod redis_backend;

use std::time::Duration;

use async_trait::async_trait;
use docjob_core::job::JobRecord;
use docjob_core::types::JobId;

pub use config::StoreConfig;
pub use memory::InMemoryStatusStore;
pub use redis_backend::RedisStatusStore;

/// Errors from a status store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Status store backend error: {0}")]
    Backend(String),

    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store of job status records.
///
/// Writers for a given id are serialized by the dispatcher, not here: the
/// store accepts concurrent writes and the last one wins.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Overwrite the full record for `job_id` and restart its retention timer.
    async fn set(&self, job_id: &JobId, record: &JobRecord) -> Result<(), StoreError>;

    /// Fetch the record, or `None` if it was never written or has expired.
    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Cheap reachability check for health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    /// How long a record survives after its last write.
    fn retention(&self) -> Duration;
}
