//! End-to-end pipeline tests: ingest documents through the worker, then ask
//! questions against the same store.

use async_trait::async_trait;
use docstash::answer::{AnswerGenerator, GenerationError, RetrievalAnswerer};
use docstash::embedding::{EmbeddingBatcher, EmbeddingClient, EmbeddingError};
use docstash::extract::PlainTextExtractor;
use docstash::ingest::{
    DocumentPayload, IngestJob, IngestQueue, IngestTask, IngestWorker,
};
use docstash::metrics::IngestMetrics;
use docstash::vector::InMemoryVectorStore;
use reqwest::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Embeds text as keyword-presence dimensions so retrieval ranks related
/// texts together without a real model.
struct KeywordEmbeddingClient;

const KEYWORDS: [&str; 3] = ["refund", "shipping", "warranty"];

#[async_trait]
impl EmbeddingClient for KeywordEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|keyword| if lower.contains(keyword) { 1.0 } else { 0.0 })
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }
}

/// Always fails with a retryable error; counts how often it was asked.
struct AlwaysRateLimitedClient {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingClient for AlwaysRateLimitedClient {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EmbeddingError::Transient {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "rate limited".into(),
        })
    }
}

/// Returns a canned answer; the prompt content is covered by unit tests.
struct CannedGenerator;

#[async_trait]
impl AnswerGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("CONTEXT:\n\n") {
            Ok("I don't see this in uploaded documents.".to_string())
        } else {
            Ok("Refunds are accepted within 30 days.".to_string())
        }
    }
}

fn batcher(client: Arc<dyn EmbeddingClient>) -> EmbeddingBatcher {
    EmbeddingBatcher::new(client, 64, 3, Duration::from_millis(0))
}

fn job(store: Arc<InMemoryVectorStore>, client: Arc<dyn EmbeddingClient>) -> IngestJob {
    IngestJob::new(
        Arc::new(PlainTextExtractor),
        None,
        batcher(client),
        store,
        50,
        "text-embedding-3-small",
        2_000,
    )
}

fn task(filename: &str, tenant: &str, body: &str) -> IngestTask {
    IngestTask::new(
        filename,
        tenant,
        DocumentPayload::Inline(body.as_bytes().to_vec()),
    )
}

async fn wait_for(metrics: &IngestMetrics, check: impl Fn(&IngestMetrics) -> bool) {
    for _ in 0..200 {
        if check(metrics) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker did not reach the expected state in time");
}

#[tokio::test]
async fn ingested_documents_answer_questions() {
    let store = Arc::new(InMemoryVectorStore::new());
    let client: Arc<dyn EmbeddingClient> = Arc::new(KeywordEmbeddingClient);
    let job = Arc::new(job(store.clone(), client.clone()));

    let (queue, rx) = IngestQueue::new();
    let metrics = Arc::new(IngestMetrics::new());
    let worker = IngestWorker::new(
        job,
        queue.clone(),
        metrics.clone(),
        3,
        Duration::ZERO,
        Duration::ZERO,
    );
    tokio::spawn(async move { worker.run(rx).await });

    queue.enqueue(task(
        "policy.txt",
        "tenant-a",
        "Our refund policy allows returns within 30 days of purchase.",
    ));
    queue.enqueue(task(
        "logistics.txt",
        "tenant-a",
        "Shipping takes five business days inside the country.",
    ));
    wait_for(&metrics, |m| m.snapshot().documents_ingested == 2).await;

    let answerer = RetrievalAnswerer::new(
        batcher(client),
        store.clone(),
        Arc::new(CannedGenerator),
        5,
        6_000,
    );
    let result = answerer
        .answer("tenant-a", "What is the refund policy?")
        .await
        .expect("answer");

    assert_eq!(result.answer, "Refunds are accepted within 30 days.");
    assert!(!result.matches.is_empty());
    let best = result.matches[0].metadata.as_ref().expect("metadata");
    assert!(best.text.to_lowercase().contains("refund"));
    assert_eq!(best.tenant, "tenant-a");
}

#[tokio::test]
async fn reingesting_a_document_does_not_duplicate_records() {
    let store = Arc::new(InMemoryVectorStore::new());
    let client: Arc<dyn EmbeddingClient> = Arc::new(KeywordEmbeddingClient);
    let job = job(store.clone(), client);

    let task = task(
        "policy.txt",
        "tenant-a",
        "Our refund policy allows returns within 30 days of purchase.",
    );
    job.run(&task).await.expect("first ingest");
    let first_count = store.record_count("tenant-a").await;
    assert!(first_count >= 1);

    job.run(&task).await.expect("second ingest");
    assert_eq!(store.record_count("tenant-a").await, first_count);
}

#[tokio::test]
async fn tenants_never_see_each_others_documents() {
    let store = Arc::new(InMemoryVectorStore::new());
    let client: Arc<dyn EmbeddingClient> = Arc::new(KeywordEmbeddingClient);
    let job = job(store.clone(), client.clone());

    job.run(&task(
        "policy.txt",
        "tenant-a",
        "Our refund policy allows returns within 30 days of purchase.",
    ))
    .await
    .expect("ingest");

    let answerer = RetrievalAnswerer::new(
        batcher(client),
        store.clone(),
        Arc::new(CannedGenerator),
        5,
        6_000,
    );
    let result = answerer
        .answer("tenant-b", "What is the refund policy?")
        .await
        .expect("answer");

    assert!(result.matches.is_empty());
    assert_eq!(result.answer, "I don't see this in uploaded documents.");
}

#[tokio::test]
async fn empty_documents_finish_without_indexing() {
    let store = Arc::new(InMemoryVectorStore::new());
    let client: Arc<dyn EmbeddingClient> = Arc::new(KeywordEmbeddingClient);
    let job = Arc::new(job(store.clone(), client));

    let (queue, rx) = IngestQueue::new();
    let metrics = Arc::new(IngestMetrics::new());
    let worker = IngestWorker::new(
        job,
        queue.clone(),
        metrics.clone(),
        3,
        Duration::ZERO,
        Duration::ZERO,
    );
    tokio::spawn(async move { worker.run(rx).await });

    queue.enqueue(task("blank.txt", "tenant-a", "   \n\t "));
    wait_for(&metrics, |m| m.snapshot().documents_without_text == 1).await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.documents_ingested, 0);
    assert_eq!(snapshot.tasks_failed, 0);
    assert_eq!(store.record_count("tenant-a").await, 0);
}

#[tokio::test]
async fn transient_failures_are_retried_until_the_budget_runs_out() {
    let store = Arc::new(InMemoryVectorStore::new());
    let client = Arc::new(AlwaysRateLimitedClient {
        calls: AtomicUsize::new(0),
    });
    // Embedding retries are part of the batcher; use a single attempt there
    // so each worker-level run costs exactly one service call.
    let batcher = EmbeddingBatcher::new(client.clone(), 64, 1, Duration::ZERO);
    let job = Arc::new(IngestJob::new(
        Arc::new(PlainTextExtractor),
        None,
        batcher,
        store.clone(),
        50,
        "text-embedding-3-small",
        2_000,
    ));

    let (queue, rx) = IngestQueue::new();
    let metrics = Arc::new(IngestMetrics::new());
    let worker = IngestWorker::new(
        job,
        queue.clone(),
        metrics.clone(),
        2,
        Duration::ZERO,
        Duration::ZERO,
    );
    tokio::spawn(async move { worker.run(rx).await });

    queue.enqueue(task("doc.txt", "tenant-a", "some indexable text"));
    wait_for(&metrics, |m| m.snapshot().tasks_failed == 1).await;

    let snapshot = metrics.snapshot();
    // Initial run plus two retries.
    assert_eq!(snapshot.tasks_retried, 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(snapshot.documents_ingested, 0);
    assert_eq!(store.record_count("tenant-a").await, 0);
}
