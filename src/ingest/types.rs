//! Task and outcome types for document ingestion.

use crate::blob::BlobError;
use crate::chunking::ChunkingError;
use crate::embedding::EmbedBatchError;
use crate::vector::VectorStoreError;
use thiserror::Error;
use uuid::Uuid;

/// Where the document bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// Bytes carried inline with the task.
    Inline(Vec<u8>),
    /// Bytes stored in the blob store under the given path.
    Stored {
        /// Object path inside the blob store.
        path: String,
    },
}

/// A unit of ingestion work: one document for one tenant.
#[derive(Debug, Clone)]
pub struct IngestTask {
    /// Stable identifier for the document.
    pub document_id: String,
    /// Original filename, kept for metadata and extraction hints.
    pub filename: String,
    /// Owning tenant; doubles as the vector store namespace.
    pub tenant: String,
    /// Source of the document bytes.
    pub payload: DocumentPayload,
    /// Optional free-form description prepended to the extracted text.
    pub description: Option<String>,
    /// Number of times this task has already been retried.
    pub attempt: u32,
}

impl IngestTask {
    /// Create a task with a fresh document id and a zero attempt counter.
    pub fn new(
        filename: impl Into<String>,
        tenant: impl Into<String>,
        payload: DocumentPayload,
    ) -> Self {
        Self {
            document_id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            tenant: tenant.into(),
            payload,
            description: None,
            attempt: 0,
        }
    }

    /// Stable key from which chunk identifiers are derived.
    ///
    /// Re-ingesting the same document must produce the same chunk ids, so the
    /// key is the storage path when one exists and a tenant-scoped filename
    /// otherwise.
    pub fn source_key(&self) -> String {
        match &self.payload {
            DocumentPayload::Stored { path } => path.clone(),
            DocumentPayload::Inline(_) => format!("{}/{}", self.tenant, self.filename),
        }
    }
}

/// Terminal result of a successful ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Document was chunked, embedded, and indexed.
    Ok {
        /// Number of chunk records written to the vector store.
        chunks_indexed: usize,
    },
    /// Extraction produced no usable text; nothing was indexed.
    NoText,
    /// Text was present but produced zero chunks; nothing was indexed.
    NoChunks,
}

/// Errors raised while running an ingestion task.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Task arrived without a tenant identifier.
    #[error("ingest task has no tenant")]
    TenantRequired,
    /// Task references stored bytes but no blob store was configured.
    #[error("task references stored bytes but no blob store is configured")]
    BlobStoreMissing,
    /// Document bytes could not be fetched.
    #[error("blob download failed: {0}")]
    Blob(#[from] BlobError),
    /// Extracted text could not be chunked.
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    /// One or more embedding batches failed after retries.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedBatchError),
    /// Chunk records could not be written to the vector index.
    #[error("vector store write failed: {0}")]
    VectorStore(#[from] VectorStoreError),
    /// Record timestamp could not be formatted.
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl IngestError {
    /// Whether re-running the whole task can plausibly succeed.
    ///
    /// Upserts are idempotent by chunk id, so retrying an entire task after a
    /// partial failure never duplicates records.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Blob(error) => error.is_transient(),
            Self::Embedding(error) => error.is_transient(),
            Self::VectorStore(error) => error.is_transient(),
            Self::TenantRequired
            | Self::BlobStoreMissing
            | Self::Chunking(_)
            | Self::Timestamp(_) => false,
        }
    }
}
