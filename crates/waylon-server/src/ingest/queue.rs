//! Notification queue
//!
//! [`NotificationQueue`] is what the orchestrator drains. [`SqsQueue`] is the
//! production implementation.

use anyhow::anyhow;
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use tracing::{debug, info, instrument};

use super::config::QueueConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    /// Handle used to acknowledge (delete) the message
    pub receipt: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to receive messages: {0}")]
    Receive(#[source] anyhow::Error),

    #[error("Failed to acknowledge message {id}: {source}")]
    Acknowledge {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Next batch of messages; may be empty after the long-poll wait
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    /// Remove a message so it is not redelivered
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    messages_per_fetch: i32,
    wait_secs: i32,
    visibility_timeout_secs: i32,
}

impl SqsQueue {
    /// Connect to the input queue, resolving its URL from a name when needed
    pub async fn connect(config: &QueueConfig) -> anyhow::Result<Self> {
        let sdk_config = crate::aws::sdk_config(&config.aws, "waylon-queue").await;
        let client = Client::new(&sdk_config);

        let queue_url = if config.input_is_url() {
            config.input_queue.clone()
        } else {
            client
                .get_queue_url()
                .queue_name(&config.input_queue)
                .send()
                .await
                .map_err(|e| {
                    anyhow!(
                        "Could not resolve queue '{}': {}",
                        config.input_queue,
                        DisplayErrorContext(&e)
                    )
                })?
                .queue_url
                .ok_or_else(|| anyhow!("Queue '{}' has no URL", config.input_queue))?
        };

        info!(queue_url = %queue_url, "Connected to input queue");

        Ok(Self {
            client,
            queue_url,
            messages_per_fetch: config.messages_per_fetch,
            wait_secs: config.wait_secs,
            visibility_timeout_secs: config.visibility_timeout_secs,
        })
    }

    /// Client handle, shared with the error-queue notifier
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl NotificationQueue for SqsQueue {
    #[instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.messages_per_fetch)
            .wait_time_seconds(self.wait_secs)
            .visibility_timeout(self.visibility_timeout_secs)
            .send()
            .await
            .map_err(|e| QueueError::Receive(anyhow!("{}", DisplayErrorContext(&e))))?;

        let messages: Vec<QueueMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                Some(QueueMessage {
                    id: m.message_id.unwrap_or_default(),
                    receipt: m.receipt_handle?,
                    body: m.body.unwrap_or_default(),
                })
            })
            .collect();

        debug!("Received {} messages", messages.len());

        Ok(messages)
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt)
            .send()
            .await
            .map_err(|e| QueueError::Acknowledge {
                id: message.id.clone(),
                source: anyhow!("{}", DisplayErrorContext(&e)),
            })?;
        Ok(())
    }
}
