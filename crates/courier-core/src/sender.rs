//! Outgoing envelope construction, queue sender and topic publisher.
//!
//! Every outgoing envelope carries the three reserved attributes:
//! `AssemblyQualifiedName` and `Type` from the message's [`CourierMessage`]
//! identity, and `CorrelationId` either supplied by the caller or freshly
//! generated. Caller attributes may not use reserved keys.

use crate::envelope::{attributes, CorrelationId, CourierMessage, MessageEnvelope, MessageId};
use crate::error::SendError;
use crate::transport::{DeliveryOptions, QueueTransport, TopicTransport};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Serialize `message` into an envelope with the reserved attributes set.
///
/// Fails with [`SendError::ReservedAttribute`] if `extra_attributes` contains
/// a reserved key.
pub fn build_envelope<M: CourierMessage>(
    message: &M,
    correlation_id: CorrelationId,
    extra_attributes: &HashMap<String, String>,
) -> Result<MessageEnvelope, SendError> {
    if let Some(key) = extra_attributes
        .keys()
        .find(|key| attributes::is_reserved(key))
    {
        return Err(SendError::ReservedAttribute { key: key.clone() });
    }

    let body = serde_json::to_vec(message).map_err(|source| SendError::Serialization {
        type_name: M::TYPE_NAME.to_string(),
        source,
    })?;

    let mut envelope = MessageEnvelope::new(body);
    envelope.attributes.extend(
        extra_attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    Ok(envelope
        .with_attribute(attributes::ASSEMBLY_QUALIFIED_NAME, M::qualified_name())
        .with_attribute(attributes::TYPE, M::TYPE_NAME)
        .with_attribute(attributes::CORRELATION_ID, correlation_id.to_string()))
}

// ============================================================================
// Options
// ============================================================================

/// Options for [`MessageSender::send_with`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Duplicate detection id (FIFO queues)
    pub deduplication_id: Option<String>,
    /// Ordering group (FIFO queues)
    pub message_group_id: Option<String>,
    /// Correlation id to attach; a fresh one is generated when absent
    pub correlation_id: Option<CorrelationId>,
    /// Additional non-reserved attributes
    pub attributes: HashMap<String, String>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    pub fn with_message_group_id(mut self, message_group_id: impl Into<String>) -> Self {
        self.message_group_id = Some(message_group_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Options for [`MessagePublisher::publish_with`].
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Correlation id to attach; a fresh one is generated when absent
    pub correlation_id: Option<CorrelationId>,
    /// Additional non-reserved attributes
    pub attributes: HashMap<String, String>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// MessageSender
// ============================================================================

/// Sends domain messages to queues.
#[derive(Clone)]
pub struct MessageSender {
    transport: Arc<dyn QueueTransport>,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Send `message` to `queue` with a fresh correlation id.
    pub async fn send<M: CourierMessage>(
        &self,
        queue: &str,
        message: &M,
    ) -> Result<MessageId, SendError> {
        self.send_with(queue, message, SendOptions::default()).await
    }

    /// Send `message` to `queue` with explicit options.
    #[instrument(skip_all, fields(queue = %queue, type_name = M::TYPE_NAME))]
    pub async fn send_with<M: CourierMessage>(
        &self,
        queue: &str,
        message: &M,
        options: SendOptions,
    ) -> Result<MessageId, SendError> {
        let correlation_id = options.correlation_id.unwrap_or_default();
        let envelope = build_envelope(message, correlation_id, &options.attributes)?;

        let delivery = DeliveryOptions {
            deduplication_id: options.deduplication_id,
            message_group_id: options.message_group_id,
        };

        let message_id = self.transport.send(queue, envelope, delivery).await?;

        debug!(
            message_id = %message_id,
            correlation_id = %correlation_id,
            "Sent message"
        );
        Ok(message_id)
    }
}

// ============================================================================
// MessagePublisher
// ============================================================================

/// Publishes domain messages to topics.
#[derive(Clone)]
pub struct MessagePublisher {
    transport: Arc<dyn TopicTransport>,
}

impl MessagePublisher {
    pub fn new(transport: Arc<dyn TopicTransport>) -> Self {
        Self { transport }
    }

    /// Publish `message` to `topic` with a fresh correlation id.
    pub async fn publish<M: CourierMessage>(
        &self,
        topic: &str,
        message: &M,
    ) -> Result<MessageId, SendError> {
        self.publish_with(topic, message, PublishOptions::default())
            .await
    }

    /// Publish `message` to `topic` with explicit options.
    #[instrument(skip_all, fields(topic = %topic, type_name = M::TYPE_NAME))]
    pub async fn publish_with<M: CourierMessage>(
        &self,
        topic: &str,
        message: &M,
        options: PublishOptions,
    ) -> Result<MessageId, SendError> {
        let correlation_id = options.correlation_id.unwrap_or_default();
        let envelope = build_envelope(message, correlation_id, &options.attributes)?;

        let message_id = self.transport.publish(topic, envelope).await?;

        debug!(
            message_id = %message_id,
            correlation_id = %correlation_id,
            "Published message"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
