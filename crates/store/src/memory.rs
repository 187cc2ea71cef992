//! In-process status store.
//!
//! Records are kept as serialized JSON, like the Redis backend, and stamped
//! with an expiry computed from the injected [`Clock`]. Expired entries read
//! as missing and are evicted lazily on access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docjob_core::clock::{Clock, SystemClock};
use docjob_core::job::{JobRecord, DEFAULT_RETENTION};
use docjob_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

use crate::{StatusStore, StoreError};

struct Entry {
    json: String,
    expires_at: Timestamp,
}

pub struct InMemoryStatusStore {
    entries: RwLock<HashMap<JobId, Entry>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl InMemoryStatusStore {
    /// A store on the system clock with the default 24 h retention.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DEFAULT_RETENTION)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            retention,
        }
    }

    /// Number of live (unexpired) records.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of all live records, in no particular order.
    pub async fn ids(&self) -> Vec<JobId> {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn expiry_from(&self, now: Timestamp) -> Timestamp {
        let ttl = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        now.checked_add_signed(ttl).unwrap_or(now)
    }
}

impl Default for InMemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn set(&self, job_id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let expires_at = self.expiry_from(self.clock.now());
        self.entries
            .write()
            .await
            .insert(job_id.clone(), Entry { json, expires_at });
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(job_id) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => {
                    return Ok(Some(serde_json::from_str(&entry.json)?));
                }
                Some(_) => {}
            }
        }

        // Expired: evict unless a concurrent write refreshed it meanwhile.
        let mut entries = self.entries.write().await;
        if entries.get(job_id).is_some_and(|e| e.expires_at <= now) {
            entries.remove(job_id);
            tracing::debug!(job_id = %job_id, "Evicted expired status record");
        }
        Ok(None)
    }

    fn retention(&self) -> Duration {
        self.retention
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
