use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docjob_api::config::ServerConfig;
use docjob_api::gateway::JobGateway;
use docjob_api::router::build_app_router;
use docjob_api::state::AppState;
use docjob_queue::{QueueConfig, RedisJobQueue};
use docjob_store::{RedisStatusStore, StatusStore, StoreConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docjob_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Status store ---
    let store = RedisStatusStore::connect(&StoreConfig::from_env())
        .await
        .expect("Failed to connect to status store");
    store.ping().await.expect("Status store health check failed");
    let store: Arc<dyn StatusStore> = Arc::new(store);
    tracing::info!("Status store connected");

    // --- Queue ---
    let queue = RedisJobQueue::connect(&QueueConfig::from_env())
        .await
        .expect("Failed to connect to job queue");
    tracing::info!("Job queue connected");

    // --- App state ---
    let state = AppState {
        gateway: Arc::new(JobGateway::new(Arc::clone(&store), Arc::new(queue))),
        store,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
