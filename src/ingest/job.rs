//! The ingestion job: fetch, extract, chunk, embed, upsert.

use crate::blob::BlobStore;
use crate::chunking::{chunk_id, chunk_text};
use crate::config::Config;
use crate::embedding::EmbeddingBatcher;
use crate::extract::TextExtractor;
use crate::ingest::{DocumentPayload, IngestError, IngestOutcome, IngestTask};
use crate::vector::{RecordMetadata, VectorRecord, VectorStore};
use std::borrow::Cow;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Runs one document through the full indexing pipeline.
///
/// The pipeline is fetch -> extract -> chunk -> embed -> upsert, with two
/// terminal short-circuits: documents that extract to no text and texts that
/// produce no chunks both finish successfully without touching the embedding
/// service or the vector store.
pub struct IngestJob {
    extractor: Arc<dyn TextExtractor>,
    blobs: Option<Arc<dyn BlobStore>>,
    batcher: EmbeddingBatcher,
    store: Arc<dyn VectorStore>,
    chunk_max_tokens: usize,
    tokenizer_model: String,
    metadata_text_limit: usize,
}

impl IngestJob {
    /// Assemble a job from its collaborators.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        blobs: Option<Arc<dyn BlobStore>>,
        batcher: EmbeddingBatcher,
        store: Arc<dyn VectorStore>,
        chunk_max_tokens: usize,
        tokenizer_model: impl Into<String>,
        metadata_text_limit: usize,
    ) -> Self {
        Self {
            extractor,
            blobs,
            batcher,
            store,
            chunk_max_tokens: chunk_max_tokens.max(1),
            tokenizer_model: tokenizer_model.into(),
            metadata_text_limit,
        }
    }

    /// Assemble a job using chunking and metadata limits from the
    /// configuration.
    pub fn from_config(
        extractor: Arc<dyn TextExtractor>,
        blobs: Option<Arc<dyn BlobStore>>,
        batcher: EmbeddingBatcher,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        Self::new(
            extractor,
            blobs,
            batcher,
            store,
            config.chunk_max_tokens,
            config.embedding_model.clone(),
            config.metadata_text_limit,
        )
    }

    /// Run the task to completion.
    ///
    /// Returns `Ok` with a terminal [`IngestOutcome`] or an error classified
    /// by [`IngestError::is_transient`] so the worker can decide between
    /// retrying and giving up. The whole task is the retry unit: chunk ids
    /// are deterministic, so a re-run after a partial upsert overwrites the
    /// records that already landed instead of duplicating them.
    pub async fn run(&self, task: &IngestTask) -> Result<IngestOutcome, IngestError> {
        if task.tenant.trim().is_empty() {
            return Err(IngestError::TenantRequired);
        }

        let bytes: Cow<[u8]> = match &task.payload {
            DocumentPayload::Inline(bytes) => Cow::Borrowed(bytes.as_slice()),
            DocumentPayload::Stored { path } => {
                let blobs = self.blobs.as_ref().ok_or(IngestError::BlobStoreMissing)?;
                Cow::Owned(blobs.download(path).await?)
            }
        };

        let text = self.extractor.extract(&task.filename, &bytes);
        if text.trim().is_empty() {
            tracing::warn!(
                document_id = %task.document_id,
                tenant = %task.tenant,
                filename = %task.filename,
                "No text extracted from document"
            );
            return Ok(IngestOutcome::NoText);
        }

        // The description rides along as extra context for retrieval, but it
        // never rescues a document that extracted to nothing.
        let text = match task.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                format!("{description}\n\n{text}")
            }
            _ => text,
        };

        let chunks = chunk_text(&text, self.chunk_max_tokens, &self.tokenizer_model)?;
        if chunks.is_empty() {
            tracing::warn!(
                document_id = %task.document_id,
                tenant = %task.tenant,
                "Document text produced no chunks"
            );
            return Ok(IngestOutcome::NoChunks);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.batcher.embed_batch(&texts).await?;

        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let source_key = task.source_key();
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk_id(&source_key, chunk.start, chunk.end),
                vector,
                metadata: RecordMetadata {
                    text: truncate_chars(&chunk.text, self.metadata_text_limit),
                    filename: task.filename.clone(),
                    document_id: task.document_id.clone(),
                    created_at: created_at.clone(),
                    tenant: task.tenant.clone(),
                },
            })
            .collect();

        let summary = self.store.upsert(&task.tenant, records).await?;
        tracing::info!(
            document_id = %task.document_id,
            tenant = %task.tenant,
            chunks = summary.upserted,
            "Document indexed"
        );
        Ok(IngestOutcome::Ok {
            chunks_indexed: summary.upserted,
        })
    }
}

/// Truncate to at most `limit` characters without splitting a code point.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_offset, _)) => text[..byte_offset].to_string(),
        None => text.to_string(),
    }
}
