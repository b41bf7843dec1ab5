//! Drains the bounce queue: decode, validate, classify, persist, ban, delete.
//!
//! Delivery is at-least-once; the deletion decision is the whole retry
//! contract. Malformed messages are deleted so they cannot wedge the queue,
//! store failures leave the message for redelivery, and ban upserts are
//! idempotent so redelivery converges instead of duplicating state.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde_json::Value;

use crate::classifier::classify;
use crate::domain::{BanRecord, Envelope};
use crate::queue::{BounceQueue, QueueError, QueueMessage};
use crate::store::{BanStore, BounceStore};
use crate::validator::validate;

/// Per-message verdict, decided by the handler and acted on by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Malformed or unexpected message: delete it, never retry.
    Drop,
    /// Processing failure: leave the message for the queue to redeliver.
    Retry,
    /// Fully handled: delete it.
    Success,
}

enum HandleError {
    Drop(String),
    Retry(String),
}

pub struct QueueConsumer<'a> {
    queue: &'a dyn BounceQueue,
    bounces: Option<&'a dyn BounceStore>,
    bans: &'a dyn BanStore,
}

impl<'a> QueueConsumer<'a> {
    pub fn new(
        queue: &'a dyn BounceQueue,
        bounces: Option<&'a dyn BounceStore>,
        bans: &'a dyn BanStore,
    ) -> Self {
        QueueConsumer { queue, bounces, bans }
    }

    /// Polls until a receive comes back empty, handling each message in
    /// order. Returns the number of ban upserts performed, which the caller
    /// uses to decide whether the blocklist export is due.
    ///
    /// Queue receive failures are fatal and abort the run; everything
    /// message-scoped is absorbed into the per-message outcome.
    pub async fn run(&self) -> Result<u64, QueueError> {
        let mut added_bans = 0u64;

        loop {
            let batch = self.queue.receive().await?;
            if batch.is_empty() {
                break;
            }

            info!("Got {} message(s) in queue", batch.len());
            for message in &batch {
                let outcome = self.handle(message, &mut added_bans).await;
                match outcome {
                    Outcome::Retry => {
                        // Left on the queue; the visibility timeout brings
                        // it back around.
                    }
                    Outcome::Drop | Outcome::Success => {
                        if let Err(err) = self.queue.delete(&message.receipt_handle).await {
                            error!(
                                "Failed to delete message {}: {}",
                                message.message_id, err
                            );
                        } else {
                            info!("Message {} deleted from queue", message.message_id);
                        }
                    }
                }
            }
        }

        info!("Done processing queue messages. Added {} bans.", added_bans);
        Ok(added_bans)
    }

    async fn handle(&self, message: &QueueMessage, added_bans: &mut u64) -> Outcome {
        info!("Got a message from the queue: {}", message.message_id);

        match self.process(message, added_bans).await {
            Ok(()) => Outcome::Success,
            Err(HandleError::Drop(why)) => {
                warn!(
                    "Invalid notification message {} received, ignore and delete: {}",
                    message.message_id, why
                );
                Outcome::Drop
            }
            Err(HandleError::Retry(why)) => {
                error!(
                    "Fatal error during handling of message {}, leaving it for redelivery: {}",
                    message.message_id, why
                );
                Outcome::Retry
            }
        }
    }

    /// Steps 1-5 of the per-message contract. `added_bans` is incremented
    /// per upsert as it happens, so a failure partway through a recipient
    /// list still counts the bans that did land.
    async fn process(
        &self,
        message: &QueueMessage,
        added_bans: &mut u64,
    ) -> Result<(), HandleError> {
        // Two-layer protocol: the body is a transport envelope, its Message
        // field is the notification payload, JSON-encoded again.
        let envelope: Envelope = serde_json::from_str(&message.body)
            .map_err(|e| HandleError::Drop(format!("message body is invalid JSON: {e}")))?;
        let inner = envelope
            .message
            .ok_or_else(|| HandleError::Drop("envelope has no Message field".to_string()))?;
        let payload: Value = serde_json::from_str(&inner)
            .map_err(|e| HandleError::Drop(format!("Message field is invalid JSON: {e}")))?;

        let kind = validate(&payload).map_err(|e| HandleError::Drop(e.to_string()))?;
        let event = classify(&payload, kind)
            .map_err(|e| HandleError::Drop(format!("malformed notification payload: {e}")))?;

        if let Some(bounces) = self.bounces {
            bounces
                .append(&payload)
                .await
                .map_err(|e| HandleError::Retry(e.to_string()))?;
            info!("Logged full {:?} payload to the bounce store", event.kind);
        }

        if event.ban_worthy {
            let timestamp = DateTime::parse_from_rfc3339(&event.timestamp)
                .map_err(|e| {
                    HandleError::Retry(format!(
                        "unparseable event timestamp `{}`: {e}",
                        event.timestamp
                    ))
                })?
                .with_timezone(&Utc);

            for recipient in &event.recipients {
                let ban = BanRecord::new(&recipient.email_address, timestamp, &event.reason);
                info!("Will ban recipient {} at {}", ban.email, ban.timestamp);
                self.bans
                    .upsert(&ban)
                    .await
                    .map_err(|e| HandleError::Retry(e.to_string()))?;
                *added_bans += 1;
            }
        }

        Ok(())
    }
}
