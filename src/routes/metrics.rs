use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::app_state::AppState;

/// State of the scrape endpoint.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub app: AppState,
}

/// Prometheus metrics scrape endpoint. Queue depth gauges are refreshed on
/// every scrape.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    for (name, queue) in state.app.queues.iter() {
        match queue.queue_depth().await {
            Ok(depth) => {
                metrics::gauge!("provider_queue_depth", "queue" => name.clone()).set(depth as f64)
            }
            Err(e) => tracing::warn!(queue = %name, error = %e, "Failed to read queue depth"),
        }
    }
    state.handle.render()
}
