//! Queue and topic transport traits.
//!
//! Transports are the glue between courier and a concrete queue/topic
//! service. The poller needs receive, delete and change-visibility; the sender
//! and publisher need send and publish.

use crate::envelope::{MessageEnvelope, MessageId, ReceiptHandle, ReceivedEnvelope};
use crate::error::TransportError;
use async_trait::async_trait;

/// Parameters for a single receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// Maximum number of messages to return
    pub max_messages: u32,
    /// Long-poll duration
    pub wait_time_seconds: u32,
    /// How long received messages stay invisible to other consumers
    pub visibility_timeout_seconds: u32,
}

impl Default for ReceiveRequest {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 30,
        }
    }
}

/// Transport-level options for a send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Duplicate detection id for queues that support it
    pub deduplication_id: Option<String>,
    /// Ordering group for queues that support it
    pub message_group_id: Option<String>,
}

/// Point-to-point queue operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receive up to `request.max_messages` messages, waiting at most
    /// `request.wait_time_seconds` for one to arrive.
    async fn receive(
        &self,
        queue: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedEnvelope>, TransportError>;

    /// Remove a message permanently.
    async fn delete(&self, queue: &str, receipt: ReceiptHandle) -> Result<(), TransportError>;

    /// Change how long a received message stays invisible.
    async fn change_visibility(
        &self,
        queue: &str,
        receipt: ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError>;

    /// Send an envelope to a queue.
    async fn send(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
        options: DeliveryOptions,
    ) -> Result<MessageId, TransportError>;

    /// Largest visibility timeout the service accepts, in seconds.
    fn max_visibility_timeout_seconds(&self) -> u32 {
        crate::config::MAX_VISIBILITY_TIMEOUT_SECONDS
    }
}

/// Fan-out topic operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicTransport: Send + Sync {
    /// Publish an envelope to every subscriber of a topic.
    async fn publish(
        &self,
        topic: &str,
        envelope: MessageEnvelope,
    ) -> Result<MessageId, TransportError>;
}
