use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use push_dispatch_service::config::Settings;
use push_dispatch_service::error::AppError;
use push_dispatch_service::notification::NotificationDispatcher;
use push_dispatch_service::providers::AdapterRegistry;
use push_dispatch_service::server::{create_app, AppState};
use push_dispatch_service::telemetry::init_telemetry;
use push_dispatch_service::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().map_err(AppError::from)?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel, &settings.log).map_err(AppError::from)?;
    tracing::info!("Configuration loaded");

    // An unusable APNs key is the only fatal dependency
    let registry = AdapterRegistry::from_settings(&settings)?;
    tracing::info!(routes = ?registry.routes(), "Provider routes configured");

    let dispatcher = Arc::new(NotificationDispatcher::new(registry));
    let shutdown = CancellationToken::new();

    // Start Redis subscriber in background
    let redis_subscriber = RedisSubscriber::new(
        settings.redis.clone(),
        dispatcher.clone(),
        shutdown.clone(),
    );
    let redis_handle = tokio::spawn(async move {
        if let Err(e) = redis_subscriber.start().await {
            tracing::error!(error = %e, "Redis subscriber failed");
        }
    });

    let state = AppState::new(settings.clone(), dispatcher);
    let app = create_app(state.clone());

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await.map_err(AppError::from)?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown.clone()))
        .await?;

    // The server may stop for reasons other than a signal
    shutdown.cancel();

    tracing::info!("Waiting for in-flight dispatches to finish...");
    state.drain(settings.server.shutdown_timeout()).await;
    let _ = redis_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
