//! Ingestion orchestrator
//!
//! Per message: `received -> downloaded -> parsed -> persisted -> reconciled
//! -> acked`, or `failed` at any step. Metadata is stored before the registry
//! is touched. Every message is acknowledged once processing has been
//! attempted; failures are reported through the [`ErrorNotifier`] instead of
//! being redelivered.

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::config::IngestConfig;
use super::locks::WorkLocks;
use super::notification::{parse_notification, NotificationError, ObjectRef};
use super::notifier::{ErrorNotifier, FailureReport};
use super::queue::{NotificationQueue, QueueError, QueueMessage};
use crate::extract::{file_name_hint, ExtractError, TabularExtractor};
use crate::reconcile::{ReconcileError, Reconciler};
use crate::storage::{MetadataError, MetadataStore, ObjectStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Downloaded,
    Parsed,
    Persisted,
    Reconciled,
    Acked,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Downloaded => "downloaded",
            Self::Parsed => "parsed",
            Self::Persisted => "persisted",
            Self::Reconciled => "reconciled",
            Self::Acked => "acked",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid notification: {0}")]
    Notification(#[from] NotificationError),

    #[error("Download failed: {0}")]
    Download(#[from] StorageError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to persist metadata: {0}")]
    Persist(#[from] MetadataError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// The stage that could not be reached
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Notification(_) => IngestStage::Received,
            Self::Download(_) | Self::Io(_) => IngestStage::Downloaded,
            Self::Extract(_) => IngestStage::Parsed,
            Self::Persist(_) => IngestStage::Persisted,
            Self::Reconcile(_) => IngestStage::Reconciled,
        }
    }
}

/// What one successful ingestion did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub work_id: String,
    pub pages: usize,
    pub toc_entries: usize,
    pub removed_images: usize,
    pub batch_id: Option<String>,
}

/// Scratch download, removed when dropped
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("waylon_{}", Uuid::new_v4())),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), "Failed to remove scratch file: {}", e),
        }
    }
}

/// Download, extract, persist and reconcile one uploaded object
pub struct IngestPipeline {
    scratch_dir: PathBuf,
    objects: Arc<dyn ObjectStore>,
    extractor: TabularExtractor,
    metadata: MetadataStore,
    reconciler: Reconciler,
    locks: WorkLocks,
}

impl IngestPipeline {
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        objects: Arc<dyn ObjectStore>,
        extractor: TabularExtractor,
        metadata: MetadataStore,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            objects,
            extractor,
            metadata,
            reconciler,
            locks: WorkLocks::new(),
        }
    }

    /// Run the whole pipeline for one object, without the queue
    #[instrument(skip(self), fields(bucket = %object.bucket, key = %object.key))]
    pub async fn process_object(&self, object: &ObjectRef) -> Result<IngestSummary, IngestError> {
        let scratch = ScratchFile::new(&self.scratch_dir);

        let size = self
            .objects
            .download_to_file(&object.bucket, &object.key, &scratch.path)
            .await?;
        debug!(stage = %IngestStage::Downloaded, size, "Downloaded source file");

        let hint = file_name_hint(&object.key);
        let data = tokio::fs::read(&scratch.path).await?;
        let work = self.extractor.extract(hint, &data)?;
        drop(scratch);
        debug!(stage = %IngestStage::Parsed, work_id = %work.id, "Parsed source file");

        let _guard = self.locks.lock(&work.id).await;

        self.metadata.store(&work).await?;
        debug!(stage = %IngestStage::Persisted, work_id = %work.id, "Stored metadata");

        let outcome = self.reconciler.reconcile(&work).await?;
        debug!(stage = %IngestStage::Reconciled, work_id = %work.id, "Reconciled registry");

        Ok(IngestSummary {
            work_id: work.id.clone(),
            pages: work.image_collection.len(),
            toc_entries: work.toc.len(),
            removed_images: outcome.removed,
            batch_id: outcome.batch.id,
        })
    }
}

/// Polls the notification queue and feeds each message through the pipeline
pub struct IngestOrchestrator {
    config: IngestConfig,
    queue: Arc<dyn NotificationQueue>,
    pipeline: IngestPipeline,
    notifier: Arc<dyn ErrorNotifier>,
}

impl IngestOrchestrator {
    pub fn new(
        config: IngestConfig,
        queue: Arc<dyn NotificationQueue>,
        pipeline: IngestPipeline,
        notifier: Arc<dyn ErrorNotifier>,
    ) -> Self {
        Self {
            config,
            queue,
            pipeline,
            notifier,
        }
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    async fn stop_requested(&self) -> bool {
        match self.config.stop_file {
            Some(ref path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Poll until the stop file appears or `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(concurrency = self.config.concurrency, "Ingestion loop started");

        loop {
            if self.stop_requested().await {
                info!("Stop file present, leaving ingestion loop");
                break;
            }

            let received = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving ingestion loop");
                    break;
                }
                received = self.queue.receive() => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {
                    tokio::time::sleep(self.config.idle_backoff()).await;
                },
                Ok(messages) => self.process_batch(messages).await,
                Err(e) => {
                    error!("{}", e);
                    tokio::time::sleep(self.config.idle_backoff()).await;
                },
            }
        }

        info!("Ingestion loop stopped");
    }

    /// Receive one batch and process every message in it
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let messages = self.queue.receive().await?;
        let count = messages.len();
        self.process_batch(messages).await;
        Ok(count)
    }

    async fn process_batch(&self, messages: Vec<QueueMessage>) {
        futures::stream::iter(messages)
            .for_each_concurrent(self.config.concurrency, |message| async move {
                self.handle_message(message).await;
            })
            .await;
    }

    /// Process, report and acknowledge a single message
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn handle_message(&self, message: QueueMessage) {
        debug!(stage = %IngestStage::Received, "Processing message");

        let (result, bucket, key) = match parse_notification(&message.body) {
            Ok(object) => {
                let result = self.pipeline.process_object(&object).await;
                (result, Some(object.bucket), Some(object.key))
            },
            Err(e) => (Err(IngestError::from(e)), None, None),
        };

        match result {
            Ok(summary) => info!(
                work_id = %summary.work_id,
                pages = summary.pages,
                "Message processed"
            ),
            Err(e) => {
                let stage = e.stage();
                error!(stage = %IngestStage::Failed, failed_at = %stage, "Message failed: {}", e);

                let report = FailureReport {
                    message_id: message.id.clone(),
                    stage,
                    error: e.to_string(),
                    bucket,
                    key,
                    body: message.body.clone(),
                    occurred_at: Utc::now(),
                };
                if let Err(notify_err) = self.notifier.notify(&report).await {
                    error!("Failed to send failure notification: {}", notify_err);
                }
            },
        }

        match self.queue.acknowledge(&message).await {
            Ok(()) => debug!(stage = %IngestStage::Acked, "Message acknowledged"),
            Err(e) => error!("{}", e),
        }
    }
}
