//! Namespace-partitioned vector store adapters.
//!
//! The [`VectorStore`] trait is a narrow translation layer over a remote
//! nearest-neighbor index. Namespaces equal tenant identifiers and are the
//! sole isolation boundary: every operation is scoped to exactly one
//! namespace, and an empty namespace is rejected before any remote call.
//! Upserts are idempotent by record id.

mod http;
mod memory;

pub use http::PineconeClient;
pub use memory::InMemoryVectorStore;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while interacting with the vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Operation was attempted without a tenant namespace.
    #[error("namespace must not be empty")]
    NamespaceRequired,
    /// Query was requested with a non-positive result bound.
    #[error("top_k must be greater than zero")]
    InvalidTopK,
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Index responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the index.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// An internal upsert batch failed after earlier batches applied.
    ///
    /// Callers must not assume all-or-nothing semantics across one `upsert`
    /// call; `failed_ids` names every record that did not apply.
    #[error("upsert applied {applied} records; {} did not apply", failed_ids.len())]
    PartialUpsert {
        /// Number of records confirmed applied before the failure.
        applied: usize,
        /// Identifiers of the records that did not apply.
        failed_ids: Vec<String>,
        /// Error raised by the failing batch.
        #[source]
        source: Box<VectorStoreError>,
    },
}

impl VectorStoreError {
    /// Whether retrying the same operation can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::PartialUpsert { source, .. } => source.is_transient(),
            Self::NamespaceRequired | Self::InvalidTopK | Self::InvalidUrl(_) => false,
        }
    }
}

/// Metadata persisted alongside each vector record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Chunk text, truncated to the configured storage limit.
    pub text: String,
    /// Source filename of the document.
    pub filename: String,
    /// Identifier of the document the chunk belongs to.
    pub document_id: String,
    /// RFC-3339 creation timestamp.
    pub created_at: String,
    /// Owning tenant; duplicated from the namespace for traceability.
    pub tenant: String,
}

/// The persisted unit in the vector store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Deterministic chunk identifier; the idempotency key for upsert.
    pub id: String,
    /// Embedding vector for the chunk text.
    pub vector: Vec<f32>,
    /// Metadata stored with the vector.
    pub metadata: RecordMetadata,
}

/// Outcome of a successful upsert call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertSummary {
    /// Number of records applied by the call.
    pub upserted: usize,
}

/// A scored match returned by a namespace query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// Identifier of the matching record.
    pub id: String,
    /// Similarity score, higher is closer.
    pub score: f32,
    /// Stored metadata when requested via `include_metadata`.
    pub metadata: Option<RecordMetadata>,
}

/// Tenant-scoped contract over the remote vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-overwrite records by id inside the given namespace.
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<UpsertSummary, VectorStoreError>;

    /// Return the `top_k` nearest records in the namespace, ranked by
    /// descending similarity. Never returns cross-namespace matches.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError>;
}

/// Reject empty tenant namespaces before any remote call is made.
pub(crate) fn validate_namespace(namespace: &str) -> Result<(), VectorStoreError> {
    if namespace.trim().is_empty() {
        return Err(VectorStoreError::NamespaceRequired);
    }
    Ok(())
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<(), VectorStoreError> {
    if top_k == 0 {
        return Err(VectorStoreError::InvalidTopK);
    }
    Ok(())
}
