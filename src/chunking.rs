//! Deterministic token-window chunking.
//!
//! Documents are segmented over the embedding model's own token sequence so
//! that the token counts seen here match what the embedding service will
//! count. Windows are fixed-size, non-overlapping, and offset-addressed:
//! every chunk carries its `[start, end)` token range, and the chunk
//! identifier is a pure function of `(source_key, start, end)`. Re-ingesting
//! the same document therefore reproduces the same identifiers, which is what
//! makes vector upserts overwrite instead of duplicate.
//!
//! Token counting prefers `tiktoken-rs` for OpenAI/known encodings and falls
//! back to `cl100k_base` when the model's tokenizer is unavailable.

use anyhow::Error as TokenizerError;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base};

/// Errors produced while turning raw text into token-bounded chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible token budget.
    #[error("max tokens per chunk must be greater than zero")]
    InvalidMaxTokens,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
    /// A token window could not be decoded back into text.
    #[error("failed to decode token window [{start}, {end}): {source}")]
    Decode {
        /// Start token offset of the failing window.
        start: usize,
        /// End token offset of the failing window.
        end: usize,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// A contiguous token range of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Decoded text for the `[start, end)` token range.
    pub text: String,
    /// Inclusive start token offset.
    pub start: usize,
    /// Exclusive end token offset.
    pub end: usize,
}

/// Split text into non-overlapping windows of at most `max_tokens` tokens.
///
/// Windows are emitted in ascending offset order and together cover the whole
/// token sequence; the last window may be shorter. Empty or whitespace-only
/// input yields an empty vector; callers treat that as "no chunks", not an
/// error. Given the same text, model, and `max_tokens`, the output is
/// identical across runs.
pub fn chunk_text(text: &str, max_tokens: usize, model: &str) -> Result<Vec<Chunk>, ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidMaxTokens);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let encoding = resolve_encoding(model)?;
    let tokens = encoding.encode_ordinary(text);
    let mut chunks = Vec::with_capacity(tokens.len().div_ceil(max_tokens));

    let mut start = 0;
    while start < tokens.len() {
        let end = (start + max_tokens).min(tokens.len());
        let window = tokens[start..end].to_vec();
        let text = encoding
            .decode(window)
            .map_err(|source| ChunkingError::Decode { start, end, source })?;
        chunks.push(Chunk { text, start, end });
        start = end;
    }

    Ok(chunks)
}

/// Derive the stable identifier for a chunk of a source document.
///
/// The identifier is the hex SHA-256 digest of `"{source_key}:{start}-{end}"`:
/// no randomness, no clock dependency. It doubles as the idempotency key
/// for vector upserts.
pub fn chunk_id(source_key: &str, start: usize, end: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_key.as_bytes());
    hasher.update(b":");
    hasher.update(start.to_string().as_bytes());
    hasher.update(b"-");
    hasher.update(end.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Count tokens the way the chunker would for the given model.
pub fn count_tokens(text: &str, model: &str) -> Result<usize, ChunkingError> {
    let encoding = resolve_encoding(model)?;
    Ok(encoding.encode_ordinary(text).len())
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };

    let resolved = match get_bpe_from_model(target) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model = target,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(target) {
                candidate
            } else {
                tracing::warn!(
                    model = target,
                    "Falling back to 'cl100k_base' encoding for chunking"
                );
                cl100k_base()
            }
        }
    };

    resolved.map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}
