use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docjob_pipeline::PipelineConfig;
use docjob_queue::{QueueConfig, RedisJobQueue};
use docjob_store::{RedisStatusStore, StatusStore, StoreConfig};
use docjob_worker::{JobDispatcher, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docjob_worker=debug,docjob_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let store_config = StoreConfig::from_env();
    let queue_config = QueueConfig::from_env();
    let pipeline_config = PipelineConfig::from_env().expect("Invalid pipeline configuration");
    tracing::info!(
        concurrency = config.concurrency,
        job_timeout_secs = config.job_timeout.as_secs(),
        queue = %queue_config.queue_key,
        "Loaded worker configuration",
    );

    // --- Status store ---
    let store = RedisStatusStore::connect(&store_config)
        .await
        .expect("Failed to connect to status store");
    store.ping().await.expect("Status store health check failed");
    tracing::info!("Status store connected");

    // --- Queue ---
    let queue = RedisJobQueue::connect(&queue_config)
        .await
        .expect("Failed to connect to job queue");
    tracing::info!("Job queue connected");
    match queue.requeue_unacked().await {
        Ok(0) => {}
        Ok(n) => tracing::warn!(count = n, "Requeued unacknowledged jobs"),
        Err(e) => tracing::error!(error = %e, "Failed to requeue unacknowledged jobs"),
    }

    // --- Pipeline ---
    let pipeline = pipeline_config
        .build()
        .await
        .expect("Failed to build pipeline");
    tracing::info!(
        tex_sink = ?pipeline_config.tex_sink,
        pdf_sink = ?pipeline_config.pdf_sink,
        latex_program = %pipeline_config.latex_program,
        "Pipeline ready",
    );

    // --- Dispatcher ---
    let dispatcher = JobDispatcher::new(
        Arc::new(queue),
        Arc::new(store),
        Arc::new(pipeline),
        &config,
    );
    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });

    tokio::select! {
        () = shutdown_signal() => {}
        joined = &mut handle => {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Dispatcher task failed");
            }
            return;
        }
    }

    // --- Graceful shutdown ---
    cancel.cancel();
    tracing::info!(
        timeout_secs = config.shutdown_timeout.as_secs(),
        "Waiting for in-flight jobs",
    );
    match tokio::time::timeout(config.shutdown_timeout, handle).await {
        Ok(_) => tracing::info!("Graceful shutdown complete"),
        Err(_) => tracing::warn!("In-flight jobs did not finish before the shutdown timeout"),
    }
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
