use std::time::Duration;

/// Queue configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Broker connection URL.
    pub broker_url: String,
    /// Redis list holding queued jobs.
    pub queue_key: String,
    /// Redis list holding received jobs until they are acknowledged.
    pub processing_key: String,
    /// How long one `BRPOP` blocks before re-arming.
    pub poll_timeout: Duration,
}

impl QueueConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                      |
    /// |------------------------|----------------------------------------------|
    /// | `BROKER_URL`           | `REDIS_URL`, else `redis://127.0.0.1:6379/0` |
    /// | `QUEUE_KEY`            | `docjob:queue`                               |
    /// | `QUEUE_PROCESSING_KEY` | `{QUEUE_KEY}:processing`                     |
    /// | `QUEUE_POLL_SECS`      | `5`                                          |
    pub fn from_env() -> Self {
        let broker_url = std::env::var("BROKER_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into());

        let queue_key = std::env::var("QUEUE_KEY").unwrap_or_else(|_| "docjob:queue".into());
        let processing_key = std::env::var("QUEUE_PROCESSING_KEY")
            .unwrap_or_else(|_| format!("{queue_key}:processing"));

        let poll_secs: u64 = std::env::var("QUEUE_POLL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("QUEUE_POLL_SECS must be a valid u64");

        Self {
            broker_url,
            queue_key,
            processing_key,
            poll_timeout: Duration::from_secs(poll_secs.max(1)),
        }
    }
}
