//! HTTP client for a Pinecone-style namespace-partitioned index.

use crate::config::Config;
use crate::vector::{
    RecordMetadata, ScoredRecord, UpsertSummary, VectorRecord, VectorStore, VectorStoreError,
    validate_namespace, validate_top_k,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lightweight HTTP client for the vector index.
///
/// Upserts are batched internally to respect the backing store's maximum
/// request size; queries are forwarded as a single call.
pub struct PineconeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    batch_size: usize,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<RecordMetadata>,
}

impl PineconeClient {
    /// Construct a new client for the given index endpoint.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|err| VectorStoreError::InvalidUrl(err.to_string()))?;
        let client = Client::builder()
            .user_agent("docstash/0.2")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: parsed.to_string().trim_end_matches('/').to_string(),
            api_key,
            batch_size: batch_size.max(1),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, VectorStoreError> {
        Self::new(
            &config.vector_store_url,
            config.vector_store_api_key.clone(),
            config.upsert_batch_size,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn send_upsert_batch(
        &self,
        namespace: &str,
        batch: &[VectorRecord],
    ) -> Result<(), VectorStoreError> {
        let body = UpsertRequest {
            vectors: batch
                .iter()
                .map(|record| UpsertVector {
                    id: &record.id,
                    values: &record.vector,
                    metadata: &record.metadata,
                })
                .collect(),
            namespace,
        };

        let mut request = self
            .client
            .post(format!("{}/vectors/upsert", self.base_url))
            .json(&body);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.header("Api-Key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::UnexpectedStatus { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PineconeClient {
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<UpsertSummary, VectorStoreError> {
        validate_namespace(namespace)?;
        if records.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let total = records.len();
        let mut applied = 0;
        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            if let Err(error) = self.send_upsert_batch(namespace, batch).await {
                tracing::error!(
                    namespace,
                    batch = batch_index,
                    applied,
                    error = %error,
                    "Vector upsert batch failed"
                );
                // Report exactly which ids did not apply: the failing batch
                // and everything after it.
                let failed_ids = records[applied..]
                    .iter()
                    .map(|record| record.id.clone())
                    .collect();
                return if applied == 0 {
                    Err(error)
                } else {
                    Err(VectorStoreError::PartialUpsert {
                        applied,
                        failed_ids,
                        source: Box::new(error),
                    })
                };
            }
            applied += batch.len();
        }

        tracing::debug!(namespace, records = total, "Vectors upserted");
        Ok(UpsertSummary { upserted: applied })
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        validate_namespace(namespace)?;
        validate_top_k(top_k)?;

        let body = QueryRequest {
            vector,
            top_k,
            namespace,
            include_metadata,
        };

        let mut request = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&body);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.header("Api-Key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(namespace, error = %error, "Vector query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        Ok(payload
            .matches
            .into_iter()
            .map(|m| ScoredRecord {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector: vec![0.1, 0.2],
            metadata: RecordMetadata {
                text: "snippet".into(),
                filename: "report.pdf".into(),
                document_id: "doc-1".into(),
                created_at: "2025-01-01T00:00:00Z".into(),
                tenant: "tenant-a".into(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_batches_records_and_counts_applied() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(json!({ "upsertedCount": 2 }));
            })
            .await;

        let client = PineconeClient::new(&server.base_url(), None, 2, Duration::from_secs(5))
            .expect("client");

        let summary = client
            .upsert(
                "tenant-a",
                vec![record("a"), record("b"), record("c")],
            )
            .await
            .expect("upsert");

        // 3 records with batch size 2 -> two underlying calls.
        mock.assert_hits(2);
        assert_eq!(summary.upserted, 3);
    }

    #[tokio::test]
    async fn upsert_requires_namespace() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = PineconeClient::new(&server.base_url(), None, 100, Duration::from_secs(5))
            .expect("client");

        let error = client.upsert("  ", vec![record("a")]).await.unwrap_err();
        assert!(matches!(error, VectorStoreError::NamespaceRequired));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn failed_batch_reports_unapplied_ids() {
        let server = MockServer::start_async().await;
        // First batch succeeds, second one hits a server error.
        let ok = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .body_contains("\"id\":\"a\"");
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .body_contains("\"id\":\"c\"");
                then.status(500).body("index unavailable");
            })
            .await;

        let client = PineconeClient::new(&server.base_url(), None, 2, Duration::from_secs(5))
            .expect("client");

        let error = client
            .upsert(
                "tenant-a",
                vec![record("a"), record("b"), record("c")],
            )
            .await
            .unwrap_err();

        ok.assert();
        match error {
            VectorStoreError::PartialUpsert {
                applied,
                failed_ids,
                ..
            } => {
                assert_eq!(applied, 2);
                assert_eq!(failed_ids, vec!["c".to_string()]);
            }
            other => panic!("expected PartialUpsert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_emits_expected_request_and_parses_matches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/query")
                    .json_body_partial(
                        json!({
                            "topK": 3,
                            "namespace": "tenant-a",
                            "includeMetadata": true
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "matches": [
                        {
                            "id": "chunk-1",
                            "score": 0.92,
                            "metadata": {
                                "text": "snippet",
                                "filename": "report.pdf",
                                "document_id": "doc-1",
                                "created_at": "2025-01-01T00:00:00Z",
                                "tenant": "tenant-a"
                            }
                        },
                        { "id": "chunk-2", "score": 0.5 }
                    ]
                }));
            })
            .await;

        let client = PineconeClient::new(&server.base_url(), None, 100, Duration::from_secs(5))
            .expect("client");

        let matches = client
            .query("tenant-a", &[0.1, 0.2], 3, true)
            .await
            .expect("query");

        mock.assert();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "chunk-1");
        assert!((matches[0].score - 0.92).abs() < f32::EPSILON);
        assert_eq!(
            matches[0].metadata.as_ref().map(|m| m.text.as_str()),
            Some("snippet")
        );
        assert!(matches[1].metadata.is_none());
    }

    #[tokio::test]
    async fn query_rejects_zero_top_k() {
        let server = MockServer::start_async().await;
        let client = PineconeClient::new(&server.base_url(), None, 100, Duration::from_secs(5))
            .expect("client");

        let error = client
            .query("tenant-a", &[0.1], 0, true)
            .await
            .unwrap_err();
        assert!(matches!(error, VectorStoreError::InvalidTopK));
    }
}
