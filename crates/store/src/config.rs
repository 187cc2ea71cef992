use std::time::Duration;

use docjob_core::job::DEFAULT_RETENTION;

/// Status store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Key prefix; records live at `{prefix}:{job_id}`.
    pub key_prefix: String,
    /// Time-to-live applied on every write.
    pub retention: Duration,
}

impl StoreConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default                      |
    /// |---------------------|------------------------------|
    /// | `REDIS_URL`         | `redis://127.0.0.1:6379/0`   |
    /// | `STATUS_KEY_PREFIX` | `job`                        |
    /// | `STATUS_TTL_SECS`   | `86400`                      |
    pub fn from_env() -> Self {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into());

        let key_prefix = std::env::var("STATUS_KEY_PREFIX").unwrap_or_else(|_| "job".into());

        let retention_secs: u64 = std::env::var("STATUS_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_RETENTION.as_secs().to_string())
            .parse()
            .expect("STATUS_TTL_SECS must be a valid u64");

        Self {
            redis_url,
            key_prefix,
            retention: Duration::from_secs(retention_secs),
        }
    }
}
