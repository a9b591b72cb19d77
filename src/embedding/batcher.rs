//! Batching and retry layer above the embedding client.

use crate::config::Config;
use crate::embedding::{EmbeddingClient, EmbeddingError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A batch of texts that could not be embedded after exhausting retries.
#[derive(Debug)]
pub struct BatchFailure {
    /// Index of the first text in the failed batch.
    pub start: usize,
    /// Number of texts in the failed batch.
    pub len: usize,
    /// Final error observed for the batch.
    pub error: EmbeddingError,
}

/// Error returned when one or more batches failed after retries.
#[derive(Debug, Error)]
pub enum EmbedBatchError {
    /// Some batches failed; the successful ones are reported by count so the
    /// caller can decide whether to retry the whole document.
    #[error("{} of {} embedding batches failed after retries", failures.len(), failures.len() + succeeded)]
    BatchesFailed {
        /// Per-batch failures, in input order.
        failures: Vec<BatchFailure>,
        /// Number of batches that succeeded.
        succeeded: usize,
    },
}

impl EmbedBatchError {
    /// Whether at least one failed batch hit a transient condition, meaning a
    /// whole-document retry can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BatchesFailed { failures, .. } => {
                failures.iter().any(|failure| failure.error.is_transient())
            }
        }
    }
}

/// Groups texts into fixed-size batches, retries transiently failed batches
/// with exponential backoff, and returns vectors aligned positionally to the
/// input.
///
/// A batch failure does not stop the remaining batches: they are still
/// attempted, and the overall error reports every failed range so the caller
/// never silently loses vectors.
#[derive(Clone)]
pub struct EmbeddingBatcher {
    client: Arc<dyn EmbeddingClient>,
    batch_size: usize,
    max_attempts: u32,
    base_delay: Duration,
}

impl EmbeddingBatcher {
    /// Build a batcher over the given client.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        batch_size: usize,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Build a batcher using batch and retry settings from the configuration.
    pub fn from_config(client: Arc<dyn EmbeddingClient>, config: &Config) -> Self {
        Self::new(
            client,
            config.embed_batch_size,
            config.embed_max_attempts,
            Duration::from_millis(config.embed_retry_base_ms),
        )
    }

    /// Embed every text, preserving input order across batch boundaries.
    ///
    /// Empty input returns an empty vector without touching the service.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedBatchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut failures = Vec::new();
        let mut succeeded = 0;

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let start = batch_index * self.batch_size;
            match self.embed_with_retry(batch, start).await {
                Ok(batch_vectors) => {
                    succeeded += 1;
                    vectors.extend(batch_vectors);
                }
                Err(error) => {
                    failures.push(BatchFailure {
                        start,
                        len: batch.len(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            debug_assert_eq!(vectors.len(), texts.len());
            Ok(vectors)
        } else {
            Err(EmbedBatchError::BatchesFailed {
                failures,
                succeeded,
            })
        }
    }

    async fn embed_with_retry(
        &self,
        batch: &[String],
        start: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.client.embed(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(error) => {
                    attempt += 1;
                    if !error.is_transient() || attempt >= self.max_attempts {
                        tracing::error!(
                            batch_start = start,
                            batch_len = batch.len(),
                            attempts = attempt,
                            error = %error,
                            "Embedding batch failed"
                        );
                        return Err(error);
                    }
                    let delay = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(20));
                    tracing::warn!(
                        batch_start = start,
                        batch_len = batch.len(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Embedding batch failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
