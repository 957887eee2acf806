//! SQS queue integration for rescore event processing
//!
//! Provides:
//! - SQS client wrapper for the rescore queue
//! - Rescore event serialization/deserialization

use crate::db::models::ContentKind;
use crate::errors::{AppError, Result};
use aws_sdk_sqs::types::{Message, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client as SqsClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// SQS limit on entries per SendMessageBatch call
const SQS_BATCH_MAX: usize = 10;

/// SQS queue client wrapper
pub struct Queue {
    client: SqsClient,
    queue_url: String,
    max_messages: i32,
    wait_time_seconds: i32,
    visibility_timeout: i32,
}

impl Queue {
    /// Create a new queue client using ambient AWS credentials
    pub async fn new(queue_url: String, config: &crate::config::QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self::with_client(client, queue_url, config))
    }

    /// Create with an existing SQS client
    pub fn with_client(
        client: SqsClient,
        queue_url: String,
        config: &crate::config::QueueConfig,
    ) -> Self {
        Self {
            client,
            queue_url,
            max_messages: config.batch_size as i32,
            wait_time_seconds: config.poll_timeout_secs as i32,
            visibility_timeout: config.visibility_timeout_secs as i32,
        }
    }

    /// Send a message to the queue
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<String> {
        let body = serde_json::to_string(message).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(&body)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to send message: {}", e),
            })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Send a batch of messages, chunked to the SQS per-call limit
    ///
    /// Returns the number of messages sent. Any rejected entry fails the
    /// whole call since callers re-enqueue at the event level.
    pub async fn send_batch<T: Serialize>(&self, messages: &[T]) -> Result<usize> {
        let mut sent = 0;

        for chunk in messages.chunks(SQS_BATCH_MAX) {
            let mut entries = Vec::with_capacity(chunk.len());
            for (i, message) in chunk.iter().enumerate() {
                let body = serde_json::to_string(message).map_err(|e| AppError::QueueError {
                    message: format!("Failed to serialize message: {}", e),
                })?;
                let entry = SendMessageBatchRequestEntry::builder()
                    .id(i.to_string())
                    .message_body(body)
                    .build()
                    .map_err(|e| AppError::QueueError {
                        message: format!("Failed to build batch entry: {}", e),
                    })?;
                entries.push(entry);
            }

            let result = self
                .client
                .send_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| AppError::QueueError {
                    message: format!("Failed to send message batch: {}", e),
                })?;

            let failed = result.failed();
            if !failed.is_empty() {
                return Err(AppError::QueueError {
                    message: format!(
                        "{} of {} batch entries rejected by the queue",
                        failed.len(),
                        chunk.len()
                    ),
                });
            }
            sent += chunk.len();
        }

        debug!(count = sent, "Message batch sent to queue");
        Ok(sent)
    }

    /// Receive messages from the queue
    pub async fn receive(&self) -> Result<Vec<Message>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_messages)
            .visibility_timeout(self.visibility_timeout)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Parse message body as JSON
    pub fn parse_message<T: DeserializeOwned>(message: &Message) -> Result<T> {
        let body = message.body.as_ref().ok_or_else(|| AppError::QueueError {
            message: "Message has no body".to_string(),
        })?;

        serde_json::from_str(body).map_err(|e| AppError::QueueError {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

/// Engagement event that invalidates one or more hot scores
///
/// Events carry enough context for the worker to resolve affected feed
/// entries without a round trip to the producing service. Fields that the
/// producer cannot cheaply supply (e.g. the parent of a comment) are
/// optional and resolved from the database instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RescoreEvent {
    /// A vote was cast or retracted on a content item
    VoteCast { kind: ContentKind, item_id: i64 },
    /// A comment was posted, bumping its thread and document
    CommentPosted {
        comment_id: i64,
        parent_comment_id: Option<i64>,
        unified_document_id: Option<i64>,
    },
    /// A bounty opened, closed, or expired
    BountyChanged {
        bounty_id: i64,
        target_kind: ContentKind,
        target_item_id: i64,
        unified_document_id: Option<i64>,
    },
    /// Content body or metadata was edited
    ContentEdited { kind: ContentKind, item_id: i64 },
    /// A user gained verified status, lifting their tip weights
    UserVerified { user_id: i64 },
    /// Direct request to recompute a single feed entry
    EntryTouched { entry_id: i64 },
}

impl RescoreEvent {
    /// Event name as it appears on the wire, for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::VoteCast { .. } => "vote_cast",
            Self::CommentPosted { .. } => "comment_posted",
            Self::BountyChanged { .. } => "bounty_changed",
            Self::ContentEdited { .. } => "content_edited",
            Self::UserVerified { .. } => "user_verified",
            Self::EntryTouched { .. } => "entry_touched",
        }
    }
}
