#![deny(missing_docs)]

//! Core library for the docstash ingestion and retrieval pipeline.

/// Retrieval-augmented answering over a tenant's documents.
pub mod answer;
/// Blob storage collaborator used to fetch document bytes.
pub mod blob;
/// Deterministic token-window chunking and chunk identifiers.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction, HTTP adapter, and batcher.
pub mod embedding;
/// Text extraction collaborator boundary.
pub mod extract;
/// Asynchronous ingestion job, queue, and worker.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Namespace-partitioned vector store adapters.
pub mod vector;
