use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    documents_without_text: AtomicU64,
    tasks_retried: AtomicU64,
    tasks_failed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully ingested document and the chunks it produced.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a document that terminated without indexable text or chunks.
    pub fn record_empty_document(&self) {
        self.documents_without_text.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task re-scheduled after a transient failure.
    pub fn record_retry(&self) {
        self.tasks_retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task that exhausted its retry budget.
    pub fn record_failure(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            documents_without_text: self.documents_without_text.load(Ordering::Relaxed),
            tasks_retried: self.tasks_retried.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents fully ingested since startup.
    pub documents_ingested: u64,
    /// Total chunk count indexed across all documents.
    pub chunks_indexed: u64,
    /// Documents that terminated as `no_text` or `no_chunks`.
    pub documents_without_text: u64,
    /// Tasks re-enqueued after a transient failure.
    pub tasks_retried: u64,
    /// Tasks that exhausted the retry budget.
    pub tasks_failed: u64,
}
