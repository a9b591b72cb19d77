//! Blob storage collaborator used to fetch document bytes.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while downloading document bytes.
#[derive(Debug, Error)]
pub enum BlobError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Storage responded with an unexpected status code.
    #[error("Unexpected blob store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from storage.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

impl BlobError {
    /// Whether retrying the same download can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// Fetches stored document bytes by path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the object at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>, BlobError>;
}

/// HTTP blob store client for bucket-style object storage.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBlobStore {
    /// Construct a new client rooted at the given bucket URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BlobError> {
        let client = Client::builder()
            .user_agent("docstash/0.2")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Construct a client from the loaded configuration, reusing the shared
    /// request timeout.
    pub fn from_config(base_url: &str, config: &Config) -> Result<Self, BlobError> {
        Self::new(base_url, None, Duration::from_secs(config.request_timeout_secs))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.get(url);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = BlobError::UnexpectedStatus { status, body };
            tracing::error!(path, error = %error, "Blob download failed");
            return Err(error);
        }

        Ok(response.bytes().await?.to_vec())
    }
}
