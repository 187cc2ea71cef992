//! Redis-backed status store.
//!
//! Each record is a plain string key `{prefix}:{job_id}` holding the JSON
//! record, written with `SET ... EX <retention>` so Redis itself handles
//! expiry. The multiplexed connection is cloned per call; clones share one
//! TCP connection.

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;
use docjob_core::job::JobRecord;
use docjob_core::types::JobId;

use crate::config::StoreConfig;
use crate::{StatusStore, StoreError};

#[derive(Clone)]
pub struct RedisStatusStore {
    conn: MultiplexedConnection,
    key_prefix: String,
    retention: Duration,
}

impl RedisStatusStore {
    /// Connect using the given configuration. Fails fast if Redis is unreachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(config.redis_url.as_str())
            .map_err(|e| StoreError::Backend(format!("failed to create Redis client: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to Redis: {e}")))?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            retention: config.retention,
        })
    }

    fn key(&self, job_id: &JobId) -> String {
        record_key(&self.key_prefix, job_id)
    }
}

fn record_key(prefix: &str, job_id: &JobId) -> String {
    format!("{prefix}:{job_id}")
}

fn map_redis_error(err: ::redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn set(&self, job_id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();

        ::redis::cmd("SET")
            .arg(self.key(job_id))
            .arg(json)
            .arg("EX")
            .arg(self.retention.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let mut conn = self.conn.clone();

        let raw: Option<String> = ::redis::cmd("GET")
            .arg(self.key(job_id))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn retention(&self) -> Duration {
        self.retention
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        ::redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_prefix_colon_id_layout() {
        let id = JobId::from("0f3c9a");
        assert_eq!(record_key("job", &id), "job:0f3c9a");
    }
}
