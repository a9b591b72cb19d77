//! Retrieval-augmented answering over a tenant's indexed documents.
//!
//! The flow mirrors ingestion in reverse: embed the question, query the
//! tenant's namespace for the nearest chunks, assemble a bounded context
//! block, and hand the grounded prompt to an answer generator. The answerer
//! never fabricates context: if retrieval finds nothing, the generator is
//! instructed to say so.

mod http;

pub use http::HttpAnswerClient;

use crate::config::Config;
use crate::embedding::{EmbedBatchError, EmbeddingBatcher};
use crate::vector::{ScoredRecord, VectorStore, VectorStoreError};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Instructions prepended to every grounded prompt.
const INSTRUCTIONS: &str = "You are a helpful assistant. Use ONLY the provided context to answer. \
If the answer is not present, say \"I don't see this in uploaded documents.\" \
Answer concisely and don't include markdown formatting.";

/// Errors raised by the answer-generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Model service responded with an unexpected status code.
    #[error("Unexpected answer service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response parsed but carried no answer.
    #[error("answer service returned no choices")]
    MalformedResponse,
}

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Question was asked without a tenant namespace.
    #[error("namespace must not be empty")]
    NamespaceRequired,
    /// Question embedding failed.
    #[error("question embedding failed: {0}")]
    Embedding(#[from] EmbedBatchError),
    /// Embedding service returned no vector for the question.
    #[error("embedding service returned no vector for the question")]
    EmptyEmbedding,
    /// Vector store query failed.
    #[error("retrieval failed: {0}")]
    VectorStore(#[from] VectorStoreError),
    /// Answer generation failed.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Produces an answer from a fully assembled, context-grounded prompt.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// A generated answer together with the records that grounded it.
#[derive(Debug)]
pub struct RetrievedAnswer {
    /// The generator's answer text.
    pub answer: String,
    /// Matches used to build the context, in descending similarity order.
    pub matches: Vec<ScoredRecord>,
}

/// Embeds questions, retrieves tenant-scoped context, and delegates the final
/// wording to an [`AnswerGenerator`].
pub struct RetrievalAnswerer {
    batcher: EmbeddingBatcher,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
    context_limit: usize,
}

impl RetrievalAnswerer {
    /// Assemble an answerer from its collaborators.
    ///
    /// `top_k` is the number of nearest chunks retrieved per question;
    /// `context_limit` bounds the assembled context in characters.
    pub fn new(
        batcher: EmbeddingBatcher,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn AnswerGenerator>,
        top_k: usize,
        context_limit: usize,
    ) -> Self {
        Self {
            batcher,
            store,
            generator,
            top_k: top_k.max(1),
            context_limit: context_limit.max(1),
        }
    }

    /// Assemble an answerer using retrieval settings from the configuration.
    pub fn from_config(
        batcher: EmbeddingBatcher,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn AnswerGenerator>,
        config: &Config,
    ) -> Self {
        Self::new(
            batcher,
            store,
            generator,
            config.top_k,
            config.answer_context_limit,
        )
    }

    /// Answer a question against the tenant's indexed documents.
    pub async fn answer(
        &self,
        namespace: &str,
        question: &str,
    ) -> Result<RetrievedAnswer, AnswerError> {
        if namespace.trim().is_empty() {
            return Err(AnswerError::NamespaceRequired);
        }

        let vectors = self.batcher.embed_batch(&[question.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or(AnswerError::EmptyEmbedding)?;

        let matches = self
            .store
            .query(namespace, &vector, self.top_k, true)
            .await?;
        tracing::debug!(
            namespace,
            matches = matches.len(),
            "Retrieved context for question"
        );

        let context = self.build_context(&matches);
        let prompt = format!("{INSTRUCTIONS}\n\nCONTEXT:\n{context}\n\nQUESTION:\n{question}");
        let answer = self.generator.generate(&prompt).await?;

        Ok(RetrievedAnswer { answer, matches })
    }

    /// Join match texts in descending similarity order until the character
    /// budget is spent. When the best match alone overruns the budget its
    /// head is kept, so a non-empty result set never yields an empty
    /// context. Matches without stored text are skipped.
    fn build_context(&self, matches: &[ScoredRecord]) -> String {
        let mut context = String::new();
        for record in matches {
            let Some(text) = record
                .metadata
                .as_ref()
                .map(|metadata| metadata.text.as_str())
                .filter(|text| !text.is_empty())
            else {
                continue;
            };

            let separator = if context.is_empty() { 0 } else { 2 };
            let available = self
                .context_limit
                .saturating_sub(context.chars().count() + separator);
            if available == 0 {
                break;
            }
            if text.chars().count() <= available {
                if !context.is_empty() {
                    context.push_str("\n\n");
                }
                context.push_str(text);
            } else if context.is_empty() {
                context.extend(text.chars().take(available));
                break;
            } else {
                break;
            }
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingError};
    use crate::vector::{InMemoryVectorStore, RecordMetadata, VectorRecord};
    use std::sync::Mutex;
    use std::time::Duration;

    struct UnitEmbeddingClient;

    #[async_trait]
    impl EmbeddingClient for UnitEmbeddingClient {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Echoes a fixed answer and records the prompt it received.
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("grounded answer".to_string())
        }
    }

    fn record(id: &str, vector: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata: RecordMetadata {
                text: text.to_string(),
                filename: "doc.txt".into(),
                document_id: "doc-1".into(),
                created_at: "2025-01-01T00:00:00Z".into(),
                tenant: "tenant-a".into(),
            },
        }
    }

    fn unit_batcher() -> EmbeddingBatcher {
        EmbeddingBatcher::new(
            Arc::new(UnitEmbeddingClient),
            64,
            3,
            Duration::from_millis(0),
        )
    }

    fn answerer(
        store: Arc<InMemoryVectorStore>,
        generator: Arc<RecordingGenerator>,
        context_limit: usize,
    ) -> RetrievalAnswerer {
        RetrievalAnswerer::new(unit_batcher(), store, generator, 5, context_limit)
    }

    fn test_config(top_k: usize, answer_context_limit: usize) -> Config {
        Config {
            vector_store_url: "http://localhost:1".into(),
            vector_store_api_key: None,
            upsert_batch_size: 100,
            embedding_url: "http://localhost:1".into(),
            embedding_api_key: None,
            embedding_model: "test-model".into(),
            embedding_dimension: 2,
            embed_batch_size: 64,
            embed_max_attempts: 3,
            embed_retry_base_ms: 0,
            request_timeout_secs: 5,
            chunk_max_tokens: 400,
            metadata_text_limit: 2_000,
            ingest_max_retries: 3,
            ingest_retry_base_secs: 0,
            ingest_retry_cap_secs: 0,
            answer_url: "http://localhost:1".into(),
            answer_api_key: None,
            answer_model: "test-model".into(),
            top_k,
            answer_context_limit,
        }
    }

    #[tokio::test]
    async fn prompt_carries_context_and_question() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert(
                "tenant-a",
                vec![record("a", vec![1.0, 0.0], "The refund window is 30 days.")],
            )
            .await
            .unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        let answerer = answerer(store, generator.clone(), 6_000);

        let result = answerer
            .answer("tenant-a", "What is the refund policy?")
            .await
            .expect("answer");

        assert_eq!(result.answer, "grounded answer");
        assert_eq!(result.matches.len(), 1);
        let prompt = generator.last_prompt();
        assert!(prompt.contains("The refund window is 30 days."));
        assert!(prompt.contains("QUESTION:\nWhat is the refund policy?"));
        assert!(prompt.contains("I don't see this in uploaded documents."));
    }

    #[tokio::test]
    async fn context_is_bounded_and_keeps_best_matches() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert(
                "tenant-a",
                vec![
                    record("near", vec![1.0, 0.0], "close match text"),
                    record("far", vec![0.0, 1.0], "distant match text"),
                ],
            )
            .await
            .unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        // Budget fits only the first snippet.
        let answerer = answerer(store, generator.clone(), 20);

        answerer.answer("tenant-a", "question").await.expect("answer");

        let prompt = generator.last_prompt();
        assert!(prompt.contains("close match text"));
        assert!(!prompt.contains("distant match text"));
    }

    #[tokio::test]
    async fn oversized_best_match_is_truncated_not_dropped() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert(
                "tenant-a",
                vec![record(
                    "only",
                    vec![1.0, 0.0],
                    "refund terms are detailed at great length here",
                )],
            )
            .await
            .unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        // Budget shorter than the single match.
        let answerer = answerer(store, generator.clone(), 12);

        answerer.answer("tenant-a", "question").await.expect("answer");

        let prompt = generator.last_prompt();
        assert!(prompt.contains("CONTEXT:\nrefund terms"));
        assert!(!prompt.contains("great length"));
    }

    #[tokio::test]
    async fn from_config_wires_top_k_and_context_limit() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert(
                "tenant-a",
                vec![
                    record("near", vec![1.0, 0.0], "close match text"),
                    record("far", vec![0.0, 1.0], "distant match text"),
                ],
            )
            .await
            .unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        let answerer = RetrievalAnswerer::from_config(
            unit_batcher(),
            store,
            generator.clone(),
            &test_config(1, 20),
        );

        let result = answerer.answer("tenant-a", "question").await.expect("answer");

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].id, "near");
        assert!(generator.last_prompt().contains("close match text"));
    }

    #[tokio::test]
    async fn empty_namespace_yields_empty_context() {
        let store = Arc::new(InMemoryVectorStore::new());
        let generator = Arc::new(RecordingGenerator::new());
        let answerer = answerer(store, generator.clone(), 6_000);

        let result = answerer
            .answer("tenant-a", "anything indexed?")
            .await
            .expect("answer");

        assert!(result.matches.is_empty());
        assert!(generator.last_prompt().contains("CONTEXT:\n\n"));
    }

    #[tokio::test]
    async fn namespace_is_required() {
        let store = Arc::new(InMemoryVectorStore::new());
        let generator = Arc::new(RecordingGenerator::new());
        let answerer = answerer(store, generator, 6_000);

        let error = answerer.answer("  ", "question").await.unwrap_err();
        assert!(matches!(error, AnswerError::NamespaceRequired));
    }
}
