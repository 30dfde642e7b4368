use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use instrument_provider::{
    app_state::AppState,
    config::AppConfig,
    routes::{self, metrics::MetricsState},
    services::{api_client::ApiClient, queue::JobQueue, telemetry},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(provider_id = config.provider_id, "Initializing instrument provider server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    telemetry::describe_metrics();

    tracing::info!(api_url = %config.api_url, "Initializing storage API client");
    let storage = ApiClient::new(&config.api_url, config.api_token.clone(), config.ssl_verify)
        .expect("Failed to initialize storage API client");

    tracing::info!("Connecting to Redis job queues");
    let queues = config
        .queues()
        .iter()
        .map(|name| JobQueue::new(&config.redis_url, name))
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to initialize job queue");

    let state = AppState::new(config.provider_id, Arc::new(storage), queues);
    let metrics_state = MetricsState {
        handle: prometheus_handle,
        app: state.clone(),
    };

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/jobs", post(routes::jobs::submit_job))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
