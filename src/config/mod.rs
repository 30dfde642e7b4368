use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the storage API
    pub api_url: String,

    /// Bearer token for the storage API
    #[serde(default)]
    pub api_token: Option<String>,

    /// Provider id used in every storage call
    pub provider_id: i64,

    /// Registry key of the provider implementation
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// Comma-separated queue names consumed by the worker
    #[serde(default = "default_provider_queue")]
    pub provider_queue: String,

    /// Verify TLS certificates for storage API and blob downloads
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,

    /// Log task trace messages at info level
    #[serde(default)]
    pub log_task_trace: bool,

    /// Worker sleep between empty polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prometheus scrape address of the worker process
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_provider() -> String {
    "sample-count".to_string()
}

fn default_provider_queue() -> String {
    "provider".to_string()
}

fn default_ssl_verify() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn metrics_socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.metrics_addr.parse()
    }

    /// Queue names in configured order. Never empty.
    pub fn queues(&self) -> Vec<String> {
        let queues: Vec<String> = self
            .provider_queue
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if queues.is_empty() {
            vec![default_provider_queue()]
        } else {
            queues
        }
    }
}
