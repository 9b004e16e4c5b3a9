//! PeerHive Server
//!
//! Loads the fine-tuned DistilBERT zone model and serves predictions
//! to the PeerHive front-end.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use peerhive_server::cli::Cli;
use peerhive_server::server;
use peerhive_server::ServerConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting PeerHive zone service");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model: {} ({})", config.model.name, config.model.source);
    info!(
        "Device: {:?}, max sequence length: {}",
        config.model.inference.device, config.model.inference.max_length
    );

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    let state = server::init_state(&config, metrics_handle).await;
    server::run_server(&config, state).await
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("peerhive_server=debug,peerhive_classifier=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("peerhive_server=info,peerhive_classifier=info,tower_http=info")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "peerhive_requests_total",
        "Total number of prediction requests received"
    );
    metrics::describe_counter!(
        "peerhive_predictions_total",
        "Successful predictions by zone"
    );
    metrics::describe_counter!("peerhive_errors_total", "Failed requests by error kind");
    metrics::describe_histogram!(
        "peerhive_inference_latency_us",
        metrics::Unit::Microseconds,
        "Tokenization plus forward pass latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
