//! HTTP client for an OpenAI-style embeddings endpoint.

use crate::config::Config;
use crate::embedding::{EmbeddingClient, EmbeddingError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Lightweight HTTP client for the embedding service.
///
/// Responses are checked against the configured vector dimensionality so a
/// misconfigured model fails loudly instead of poisoning the index.
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Construct a new client for the given endpoint, model, and vector
    /// dimensionality.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .user_agent("docstash/0.2")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            dimension,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingError> {
        Self::new(
            &config.embedding_url,
            config.embedding_api_key.clone(),
            &config.embedding_model,
            config.embedding_dimension,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.client.post(url).json(&json!({
            "model": self.model,
            "input": texts,
        }));
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                EmbeddingError::Transient { status, body }
            } else {
                EmbeddingError::Rejected { status, body }
            };
            tracing::warn!(model = %self.model, error = %error, "Embedding request failed");
            return Err(error);
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(EmbeddingError::Misaligned {
                expected: texts.len(),
                actual: payload.data.len(),
            });
        }
        if let Some(row) = payload
            .data
            .iter()
            .find(|row| row.embedding.len() != self.dimension)
        {
            return Err(EmbeddingError::WrongDimension {
                expected: self.dimension,
                actual: row.embedding.len(),
            });
        }

        // The provider tags each row with its input index; order by it so
        // positional zipping downstream stays correct.
        let mut rows = payload.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}
