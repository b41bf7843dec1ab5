//! Queue access behind a trait so the consumer never sees the AWS client.

use async_trait::async_trait;
use thiserror::Error;

/// Receive at most this many messages per poll.
pub const MAX_MESSAGES_PER_RECEIVE: i32 = 2;
/// Long-poll wait per receive call, in seconds.
pub const RECEIVE_WAIT_SECONDS: i32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("could not resolve url for queue `{queue}`: {reason}")]
    Resolve { queue: String, reason: String },
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("delete failed: {0}")]
    Delete(String),
}

#[async_trait]
pub trait BounceQueue: Send + Sync {
    /// Long-polls for the next batch. An empty batch means the backlog is
    /// drained for now.
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    /// Removes a handled message so it is not redelivered.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Builds an SQS client from static credentials and resolves the queue
    /// URL once. Resolution failure is fatal for the run.
    pub async fn connect(
        region: &str,
        access_key: &str,
        secret_key: &str,
        queue_name: &str,
    ) -> Result<Self, QueueError> {
        use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};

        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "ses-bounce-handler",
            ))
            .build();
        let client = aws_sdk_sqs::Client::from_conf(config);

        let queue_url = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::Resolve {
                queue: queue_name.to_string(),
                reason: e.to_string(),
            })?
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::Resolve {
                queue: queue_name.to_string(),
                reason: "response carried no queue url".to_string(),
            })?;

        log::info!("Resolved queue url {} for {}", queue_url, queue_name);

        Ok(SqsQueue { client, queue_url })
    }
}

#[async_trait]
impl BounceQueue for SqsQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(MAX_MESSAGES_PER_RECEIVE)
            .wait_time_seconds(RECEIVE_WAIT_SECONDS)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let messages = response
            .messages()
            .iter()
            .map(|m| QueueMessage {
                message_id: m.message_id().unwrap_or_default().to_string(),
                receipt_handle: m.receipt_handle().unwrap_or_default().to_string(),
                body: m.body().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.to_string()))?;

        Ok(())
    }
}
