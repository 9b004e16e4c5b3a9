use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use peerhive_classifier::ModelState;
use tokio::signal;
use tracing::{error, info, warn};

/// Load the model and build the application state
pub async fn init_state(config: &ServerConfig, metrics_handle: PrometheusHandle) -> AppState {
    let model = ModelState::initialize(&config.model).await;
    if !model.is_loaded() {
        warn!("Serving with inference disabled; /predict will return 500");
    }
    AppState::new(model, metrics_handle)
}

/// Run the server until a shutdown signal arrives
pub async fn run_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = routes::create_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
