use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::ProviderFactory;
use crate::services::{api::StorageApi, blobs::BlobStore, queue::JobQueue};

/// Context handed to every task handler. Built once at worker start.
#[derive(Clone)]
pub struct TaskContext {
    pub provider_id: i64,
    pub storage: Arc<dyn StorageApi>,
    pub blobs: Arc<dyn BlobStore>,
    pub provider: ProviderFactory,
    /// Promote task trace messages to `info`.
    pub trace: bool,
}

impl TaskContext {
    pub fn new(
        provider_id: i64,
        storage: Arc<dyn StorageApi>,
        blobs: Arc<dyn BlobStore>,
        provider: ProviderFactory,
    ) -> Self {
        Self {
            provider_id,
            storage,
            blobs,
            provider,
            trace: false,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider_id: i64,
    pub storage: Arc<dyn StorageApi>,
    pub queues: Arc<HashMap<String, JobQueue>>,
    /// Queue used when a submission names none.
    pub default_queue: String,
}

impl AppState {
    pub fn new(provider_id: i64, storage: Arc<dyn StorageApi>, queues: Vec<JobQueue>) -> Self {
        let default_queue = queues
            .first()
            .map(|q| q.name().to_string())
            .unwrap_or_default();
        let queues = queues
            .into_iter()
            .map(|q| (q.name().to_string(), q))
            .collect();

        Self {
            provider_id,
            storage,
            queues: Arc::new(queues),
            default_queue,
        }
    }

    pub fn queue(&self, name: Option<&str>) -> Option<&JobQueue> {
        self.queues.get(name.unwrap_or(&self.default_queue))
    }
}
