//! At-least-once task queue and worker loop.

use crate::config::Config;
use crate::ingest::{IngestJob, IngestOutcome, IngestTask};
use crate::metrics::IngestMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Delay before the next retry: `min(base * 2^attempt, cap)`.
pub fn retry_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(20)).min(cap)
}

/// Handle for submitting ingestion tasks.
///
/// Cloneable; the worker keeps its own clone so retried tasks can be
/// re-enqueued onto the same channel.
#[derive(Clone)]
pub struct IngestQueue {
    tx: UnboundedSender<IngestTask>,
}

impl IngestQueue {
    /// Create a queue and the receiver the worker drains.
    pub fn new() -> (Self, UnboundedReceiver<IngestTask>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submit a task for processing.
    pub fn enqueue(&self, task: IngestTask) {
        if self.tx.send(task).is_err() {
            tracing::warn!("Ingest queue receiver dropped; task discarded");
        }
    }

    /// Submit a task after the given delay.
    pub fn enqueue_after(&self, task: IngestTask, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(task).is_err() {
                tracing::warn!("Ingest queue receiver dropped; retried task discarded");
            }
        });
    }
}

/// Drains the queue, running each task through the [`IngestJob`] and
/// rescheduling transient failures with exponential backoff.
pub struct IngestWorker {
    job: Arc<IngestJob>,
    queue: IngestQueue,
    metrics: Arc<IngestMetrics>,
    max_retries: u32,
    retry_base: Duration,
    retry_cap: Duration,
}

impl IngestWorker {
    /// Assemble a worker over a job and the queue it re-enqueues into.
    pub fn new(
        job: Arc<IngestJob>,
        queue: IngestQueue,
        metrics: Arc<IngestMetrics>,
        max_retries: u32,
        retry_base: Duration,
        retry_cap: Duration,
    ) -> Self {
        Self {
            job,
            queue,
            metrics,
            max_retries,
            retry_base,
            retry_cap,
        }
    }

    /// Assemble a worker using retry settings from the configuration.
    pub fn from_config(
        job: Arc<IngestJob>,
        queue: IngestQueue,
        metrics: Arc<IngestMetrics>,
        config: &Config,
    ) -> Self {
        Self::new(
            job,
            queue,
            metrics,
            config.ingest_max_retries,
            Duration::from_secs(config.ingest_retry_base_secs),
            Duration::from_secs(config.ingest_retry_cap_secs),
        )
    }

    /// Process tasks until the channel closes.
    ///
    /// Tasks run one at a time; at-least-once delivery plus idempotent
    /// upserts make duplicate processing harmless.
    pub async fn run(&self, mut rx: UnboundedReceiver<IngestTask>) {
        while let Some(task) = rx.recv().await {
            self.handle(task).await;
        }
        tracing::info!("Ingest queue closed; worker stopping");
    }

    async fn handle(&self, mut task: IngestTask) {
        match self.job.run(&task).await {
            Ok(IngestOutcome::Ok { chunks_indexed }) => {
                self.metrics.record_document(chunks_indexed as u64);
            }
            Ok(IngestOutcome::NoText) | Ok(IngestOutcome::NoChunks) => {
                self.metrics.record_empty_document();
            }
            Err(error) if error.is_transient() && task.attempt < self.max_retries => {
                let delay = retry_delay(self.retry_base, self.retry_cap, task.attempt);
                task.attempt += 1;
                tracing::warn!(
                    document_id = %task.document_id,
                    tenant = %task.tenant,
                    attempt = task.attempt,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "Ingest task failed; retrying"
                );
                self.metrics.record_retry();
                self.queue.enqueue_after(task, delay);
            }
            Err(error) => {
                tracing::error!(
                    document_id = %task.document_id,
                    tenant = %task.tenant,
                    attempts = task.attempt + 1,
                    error = %error,
                    "Ingest task failed permanently"
                );
                self.metrics.record_failure();
            }
        }
    }
}
