pub mod api;
pub mod api_client;
pub mod blobs;
pub mod queue;
pub mod telemetry;
