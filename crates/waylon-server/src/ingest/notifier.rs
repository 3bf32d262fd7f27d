//! Out-of-band failure reporting
//!
//! Failed messages are acknowledged like successful ones, so the report sent
//! here is the only record of the failure.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use super::orchestrator::IngestStage;

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub message_id: String,
    /// Stage that could not be completed
    pub stage: IngestStage,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Original notification body, for manual re-drop
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait ErrorNotifier: Send + Sync {
    async fn notify(&self, report: &FailureReport) -> anyhow::Result<()>;
}

/// Writes failure reports to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ErrorNotifier for LogNotifier {
    async fn notify(&self, report: &FailureReport) -> anyhow::Result<()> {
        error!(
            message_id = %report.message_id,
            stage = %report.stage,
            bucket = report.bucket.as_deref().unwrap_or("-"),
            key = report.key.as_deref().unwrap_or("-"),
            body = %report.body,
            "Ingestion failed: {}",
            report.error
        );
        Ok(())
    }
}

/// Publishes failure reports as JSON to an error queue
#[derive(Clone)]
pub struct QueueNotifier {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl QueueNotifier {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl ErrorNotifier for QueueNotifier {
    async fn notify(&self, report: &FailureReport) -> anyhow::Result<()> {
        LogNotifier.notify(report).await?;

        let body = serde_json::to_string(report)?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to publish failure report: {}",
                    aws_sdk_sqs::error::DisplayErrorContext(&e)
                )
            })?;
        Ok(())
    }
}
