//! Ingestion pipeline
//!
//! - **config**: worker and queue configuration (`INGEST_*`, `QUEUE_*`)
//! - **notification**: object-created event parsing
//! - **queue**: [`NotificationQueue`] seam and the SQS implementation
//! - **notifier**: out-of-band failure reports
//! - **locks**: per-work-id mutual exclusion for parallel workers
//! - **orchestrator**: the download / extract / persist / reconcile loop

pub mod config;
pub mod locks;
pub mod notification;
pub mod notifier;
pub mod orchestrator;
pub mod queue;

pub use config::{IngestConfig, QueueConfig};
pub use notification::{parse_notification, ObjectRef};
pub use notifier::{ErrorNotifier, FailureReport, LogNotifier, QueueNotifier};
pub use orchestrator::{IngestError, IngestOrchestrator, IngestPipeline, IngestStage, IngestSummary};
pub use queue::{NotificationQueue, QueueError, QueueMessage, SqsQueue};
