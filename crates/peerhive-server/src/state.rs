use metrics_exporter_prometheus::PrometheusHandle;
use peerhive_classifier::ModelState;
use std::sync::Arc;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Model loaded (or not) at start-up
    pub model: Arc<ModelState>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(model: ModelState, metrics_handle: PrometheusHandle) -> Self {
        Self {
            model: Arc::new(model),
            metrics_handle,
        }
    }
}
