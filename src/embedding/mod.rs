//! Embedding service boundary.
//!
//! [`EmbeddingClient`] is the narrow collaborator contract: one call embeds
//! one ordered batch of texts and returns one vector per text, in order.
//! [`EmbeddingBatcher`] sits above it and owns batching, retry, and failure
//! isolation; everything downstream talks to the batcher.

mod batcher;
mod http;

pub use batcher::{BatchFailure, EmbedBatchError, EmbeddingBatcher};
pub use http::HttpEmbeddingClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP layer failed before receiving a response (network, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider signalled a transient condition (rate limit, server error).
    #[error("embedding service unavailable ({status}): {body}")]
    Transient {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider rejected the request; retrying cannot fix this.
    #[error("embedding request rejected ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a different number of vectors than texts submitted.
    #[error("embedding response misaligned: expected {expected} vectors, got {actual}")]
    Misaligned {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// Provider returned a vector of the wrong dimensionality.
    #[error("embedding has wrong dimension: expected {expected}, got {actual}")]
    WrongDimension {
        /// Configured vector dimensionality.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },
}

impl EmbeddingError {
    /// Whether retrying the same request can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Transient { .. } => true,
            Self::Rejected { .. } | Self::Misaligned { .. } | Self::WrongDimension { .. } => false,
        }
    }
}

/// Interface implemented by embedding backends.
///
/// One call submits one batch; the implementation must preserve input order
/// and return exactly one vector per input text.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
