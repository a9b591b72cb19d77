//! In-memory vector store for tests and local development.

use crate::vector::{
    RecordMetadata, ScoredRecord, UpsertSummary, VectorRecord, VectorStore, VectorStoreError,
    validate_namespace, validate_top_k,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Brute-force cosine-similarity store keyed by namespace and record id.
///
/// Not suitable for production traffic, but it honors the full
/// [`VectorStore`] contract (idempotent upsert, namespace isolation,
/// descending-similarity ranking), which makes it the fixture for pipeline
/// tests.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, StoredRecord>>>,
}

struct StoredRecord {
    vector: Vec<f32>,
    metadata: RecordMetadata,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in a namespace.
    pub async fn record_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<UpsertSummary, VectorStoreError> {
        validate_namespace(namespace)?;
        let upserted = records.len();
        let mut namespaces = self.namespaces.write().await;
        let space = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            space.insert(
                record.id,
                StoredRecord {
                    vector: record.vector,
                    metadata: record.metadata,
                },
            );
        }
        Ok(UpsertSummary { upserted })
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

        let namespaces = self.namespaces.read().await;
        let Some(space) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &String, &StoredRecord)> = space
            .iter()
            .map(|(id, record)| (Self::cosine_similarity(vector, &record.vector), id, record))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, id, record)| ScoredRecord {
                id: id.clone(),
                score,
                metadata: include_metadata.then(|| record.metadata.clone()),
            })
            .collect())
    }
}
