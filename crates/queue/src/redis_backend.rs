//! Durable job queue on a Redis list.
//!
//! Producers `LPUSH` JSON-encoded [`QueuedJob`]s. Consumers `BLMOVE` each
//! message onto a processing list in the same atomic step, and `LREM` it from
//! there once the job is acknowledged. A message popped by a receive that was
//! dropped before reading the reply, or by a worker that died mid-job, stays
//! on the processing list until [`RedisJobQueue::requeue_unacked`] puts it
//! back.
//!
//! `BLMOVE` blocks its connection, so each `receive` call opens its own
//! connection instead of sharing the producer's multiplexed one.

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;

use crate::config::QueueConfig;
use crate::message::QueuedJob;
use crate::{JobQueue, QueueError};

pub struct RedisJobQueue {
    client: ::redis::Client,
    producer: MultiplexedConnection,
    queue_key: String,
    processing_key: String,
    poll_timeout: Duration,
}

impl RedisJobQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = ::redis::Client::open(config.broker_url.as_str())
            .map_err(|e| QueueError::Backend(format!("failed to create Redis client: {e}")))?;
        let producer = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Backend(format!("failed to connect to Redis: {e}")))?;

        Ok(Self {
            client,
            producer,
            queue_key: config.queue_key.clone(),
            processing_key: config.processing_key.clone(),
            poll_timeout: config.poll_timeout,
        })
    }

    /// Move every unacknowledged message back onto the queue, oldest first
    /// in line. Returns how many were moved.
    ///
    /// Run at worker startup. A job that another live worker is still
    /// executing may be delivered twice; the dispatcher skips deliveries of
    /// jobs that already finished.
    pub async fn requeue_unacked(&self) -> Result<usize, QueueError> {
        let mut conn = self.producer.clone();
        let mut moved = 0;
        loop {
            let message: Option<String> = ::redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.queue_key)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            match message {
                Some(_) => moved += 1,
                None => return Ok(moved),
            }
        }
    }

    async fn remove_from_processing(&self, raw: &str) -> Result<(), QueueError> {
        let mut conn = self.producer.clone();
        ::redis::cmd("LREM")
            .arg(&self.processing_key)
            .arg(1)
            .arg(raw)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: ::redis::RedisError) -> QueueError {
    QueueError::Backend(err.to_string())
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        let json = serde_json::to_string(&job)?;
        let mut conn = self.producer.clone();

        ::redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(json)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_redis_error)
    }

    async fn receive(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;

        loop {
            let popped: Option<String> = ::redis::cmd("BLMOVE")
                .arg(&self.queue_key)
                .arg(&self.processing_key)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(self.poll_timeout.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;

            let Some(raw) = popped else { continue };
            match serde_json::from_str::<QueuedJob>(&raw) {
                Ok(mut job) => {
                    job.receipt = Some(raw);
                    return Ok(Some(job));
                }
                Err(e) => {
                    // A poison message must not wedge the consumer.
                    tracing::error!(error = %e, "Dropping malformed queue message");
                    self.remove_from_processing(&raw).await?;
                }
            }
        }
    }

    async fn ack(&self, job: &QueuedJob) -> Result<(), QueueError> {
        match &job.receipt {
            Some(raw) => self.remove_from_processing(raw).await,
            None => Ok(()),
        }
    }
}
