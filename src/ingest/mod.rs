//! Asynchronous document ingestion.
//!
//! An [`IngestTask`] enters through the [`IngestQueue`]; the [`IngestWorker`]
//! drains the queue and runs each task through the [`IngestJob`] pipeline.
//! Delivery is at-least-once: transient failures are re-enqueued with
//! exponential backoff up to a retry budget, and idempotent chunk ids make
//! duplicate runs overwrite rather than duplicate.

mod job;
mod queue;
mod types;

pub use job::IngestJob;
pub use queue::{IngestQueue, IngestWorker, retry_delay};
pub use types::{DocumentPayload, IngestError, IngestOutcome, IngestTask};
