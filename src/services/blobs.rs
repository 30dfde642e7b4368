use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Generic payload download for sample, request, validation and model blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, BlobError>;
}

/// Downloads blobs over HTTP(S).
pub struct HttpBlobClient {
    http: Client,
}

impl HttpBlobClient {
    /// `ssl_verify = false` accepts invalid certificates.
    pub fn new(ssl_verify: bool) -> Result<Self, BlobError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl BlobStore for HttpBlobClient {
    async fn fetch_json(&self, url: &str) -> Result<Value, BlobError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(BlobError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob download from {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("Blob download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BlobError {
    /// Whether the download may succeed if attempted again later.
    pub fn is_transient(&self) -> bool {
        !matches!(self, BlobError::Decode(_))
    }
}
