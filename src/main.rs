use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use beacon_stats::config::Settings;
use beacon_stats::server::{create_app, AppState};
use beacon_stats::store::create_store;
use beacon_stats::tasks::{BroadcastTask, SnapshotTask};
use beacon_stats::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes OTLP spans on drop
    let _telemetry_guard = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Connect to the store; startup fails if the backend is unreachable
    let store = create_store(&settings.redis, &settings.stats).await?;
    tracing::info!(backend = store.backend_name(), "Store connected");

    // Create application state
    let state = AppState::new(settings.clone(), store);
    tracing::info!("Application state initialized");

    // Shutdown signal shared by all background tasks
    let (shutdown_tx, _) = broadcast::channel(1);

    // Start history snapshot task in background
    let snapshot_task = SnapshotTask::new(
        settings.stats.snapshot_interval_ms,
        state.sampler.clone(),
        shutdown_tx.subscribe(),
    );
    let snapshot_handle = tokio::spawn(async move {
        snapshot_task.run().await;
    });

    // Start dashboard broadcast task in background
    let broadcast_task = BroadcastTask::new(
        settings.stats.broadcast_interval_ms,
        state.aggregator.clone(),
        state.connection_manager.clone(),
        shutdown_tx.subscribe(),
    );
    let broadcast_handle = tokio::spawn(async move {
        broadcast_task.run().await;
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(snapshot_handle, broadcast_handle);

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
