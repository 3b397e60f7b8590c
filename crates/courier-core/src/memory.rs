//! In-memory queue and topic transport for testing and development.
//!
//! Behaves like a managed queue service closely enough to exercise a poller
//! end to end:
//! - Received messages stay invisible until deleted, released or their
//!   visibility timeout expires
//! - Receives long-poll up to the requested wait time
//! - Receipt handles are per receive; a stale handle is rejected
//! - Deduplication ids suppress repeated sends to the same queue
//! - Topics fan out to every subscribed queue
//!
//! Clones share the same storage.

use crate::envelope::{MessageEnvelope, MessageId, ReceiptHandle, ReceivedEnvelope};
use crate::error::TransportError;
use crate::transport::{DeliveryOptions, QueueTransport, ReceiveRequest, TopicTransport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Upper bound on a single long-poll sleep, so expiring visibility timeouts
/// are noticed without a dedicated timer.
const POLL_STEP: Duration = Duration::from_millis(50);

// ============================================================================
// Internal Storage Structures
// ============================================================================

#[derive(Default)]
struct TransportStorage {
    queues: HashMap<String, InMemoryQueue>,
    /// Topic name to subscribed queue names
    topics: HashMap<String, Vec<String>>,
}

impl TransportStorage {
    fn queue_mut(&mut self, queue: &str) -> Result<&mut InMemoryQueue, TransportError> {
        self.queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound {
                queue: queue.to_string(),
            })
    }
}

#[derive(Default)]
struct InMemoryQueue {
    /// Visible messages, oldest first
    messages: VecDeque<StoredMessage>,
    /// Received messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
    deduplication_ids: HashMap<String, MessageId>,
}

impl InMemoryQueue {
    /// Move in-flight messages whose visibility timeout has passed back to
    /// the visible set.
    fn expire_in_flight(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(entry) = self.in_flight.remove(&receipt) {
                self.messages.push_back(entry.message);
            }
        }
    }

    fn take_visible(&mut self, request: ReceiveRequest, now: Instant) -> Vec<ReceivedEnvelope> {
        self.expire_in_flight(now);

        let visible_at = now + Duration::from_secs(u64::from(request.visibility_timeout_seconds));
        let mut received = Vec::new();

        while received.len() < request.max_messages.max(1) as usize {
            let Some(mut message) = self.messages.pop_front() else {
                break;
            };

            message.receive_count += 1;
            let receipt = uuid::Uuid::new_v4().to_string();
            received.push(ReceivedEnvelope::new(
                message.to_envelope(),
                ReceiptHandle::new(receipt.clone()),
                message.receive_count,
            ));
            self.in_flight.insert(
                receipt,
                InFlightMessage {
                    message,
                    visible_at,
                },
            );
        }

        received
    }
}

#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    attributes: HashMap<String, String>,
    receive_count: u32,
}

impl StoredMessage {
    fn from_envelope(envelope: MessageEnvelope, message_id: MessageId) -> Self {
        Self {
            message_id,
            body: envelope.body,
            attributes: envelope.attributes,
            receive_count: 0,
        }
    }

    fn to_envelope(&self) -> MessageEnvelope {
        MessageEnvelope {
            message_id: Some(self.message_id.clone()),
            body: self.body.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// Queue and topic transport backed by process memory.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    storage: Arc<Mutex<TransportStorage>>,
    arrivals: Arc<Notify>,
}

impl InMemoryTransport {
    /// Create an empty transport with no queues or topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue. Creating an existing queue is a no-op.
    pub async fn create_queue(&self, queue: &str) {
        let mut storage = self.storage.lock().await;
        storage.queues.entry(queue.to_string()).or_default();
    }

    /// Create a topic. Creating an existing topic is a no-op.
    pub async fn create_topic(&self, topic: &str) {
        let mut storage = self.storage.lock().await;
        storage.topics.entry(topic.to_string()).or_default();
    }

    /// Subscribe a queue to a topic, creating the topic if needed.
    pub async fn subscribe(&self, topic: &str, queue: &str) -> Result<(), TransportError> {
        let mut storage = self.storage.lock().await;
        if !storage.queues.contains_key(queue) {
            return Err(TransportError::QueueNotFound {
                queue: queue.to_string(),
            });
        }

        let subscribers = storage.topics.entry(topic.to_string()).or_default();
        if !subscribers.iter().any(|existing| existing == queue) {
            subscribers.push(queue.to_string());
        }
        Ok(())
    }

    /// Number of messages currently visible on a queue.
    pub async fn visible_count(&self, queue: &str) -> Result<usize, TransportError> {
        let mut storage = self.storage.lock().await;
        let queue = storage.queue_mut(queue)?;
        queue.expire_in_flight(Instant::now());
        Ok(queue.messages.len())
    }

    /// Number of messages received but not yet deleted or released.
    pub async fn in_flight_count(&self, queue: &str) -> Result<usize, TransportError> {
        let mut storage = self.storage.lock().await;
        let queue = storage.queue_mut(queue)?;
        queue.expire_in_flight(Instant::now());
        Ok(queue.in_flight.len())
    }

    fn enqueue(
        storage: &mut TransportStorage,
        queue: &str,
        envelope: MessageEnvelope,
        message_id: MessageId,
        options: &DeliveryOptions,
    ) -> Result<MessageId, TransportError> {
        let queue = storage.queue_mut(queue)?;

        if let Some(deduplication_id) = &options.deduplication_id {
            if let Some(existing) = queue.deduplication_ids.get(deduplication_id) {
                return Ok(existing.clone());
            }
        }

        if let Some(deduplication_id) = &options.deduplication_id {
            queue
                .deduplication_ids
                .insert(deduplication_id.clone(), message_id.clone());
        }

        queue
            .messages
            .push_back(StoredMessage::from_envelope(envelope, message_id.clone()));
        Ok(message_id)
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn receive(
        &self,
        queue: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedEnvelope>, TransportError> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(request.wait_time_seconds));

        loop {
            let arrival = self.arrivals.notified();
            {
                let mut storage = self.storage.lock().await;
                let received = storage
                    .queue_mut(queue)?
                    .take_visible(request, Instant::now());
                if !received.is_empty() {
                    debug!(queue = %queue, count = received.len(), "Received messages");
                    return Ok(received);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            let step = (deadline - now).min(POLL_STEP);
            let _ = tokio::time::timeout(step, arrival).await;
        }
    }

    async fn delete(&self, queue: &str, receipt: ReceiptHandle) -> Result<(), TransportError> {
        let mut storage = self.storage.lock().await;
        let queue_state = storage.queue_mut(queue)?;
        queue_state.expire_in_flight(Instant::now());

        match queue_state.in_flight.remove(receipt.as_str()) {
            Some(entry) => {
                debug!(queue = %queue, message_id = %entry.message.message_id, "Deleted message");
                Ok(())
            }
            None => Err(TransportError::InvalidReceipt {
                message: format!("receipt '{}' is not in flight", receipt.as_str()),
            }),
        }
    }

    async fn change_visibility(
        &self,
        queue: &str,
        receipt: ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError> {
        if visibility_timeout_seconds > self.max_visibility_timeout_seconds() {
            return Err(TransportError::ProviderError {
                provider: "memory".to_string(),
                code: "InvalidParameterValue".to_string(),
                message: format!(
                    "visibility timeout {} exceeds {}",
                    visibility_timeout_seconds,
                    self.max_visibility_timeout_seconds()
                ),
            });
        }

        let now = Instant::now();
        let mut storage = self.storage.lock().await;
        let queue_state = storage.queue_mut(queue)?;
        queue_state.expire_in_flight(now);

        if visibility_timeout_seconds == 0 {
            let entry = queue_state.in_flight.remove(receipt.as_str()).ok_or_else(|| {
                TransportError::InvalidReceipt {
                    message: format!("receipt '{}' is not in flight", receipt.as_str()),
                }
            })?;
            queue_state.messages.push_back(entry.message);
            drop(storage);
            self.arrivals.notify_waiters();
            return Ok(());
        }

        let entry = queue_state.in_flight.get_mut(receipt.as_str()).ok_or_else(|| {
            TransportError::InvalidReceipt {
                message: format!("receipt '{}' is not in flight", receipt.as_str()),
            }
        })?;
        entry.visible_at = now + Duration::from_secs(u64::from(visibility_timeout_seconds));
        Ok(())
    }

    async fn send(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
        options: DeliveryOptions,
    ) -> Result<MessageId, TransportError> {
        let message_id = {
            let mut storage = self.storage.lock().await;
            Self::enqueue(&mut storage, queue, envelope, MessageId::generate(), &options)?
        };

        self.arrivals.notify_waiters();
        Ok(message_id)
    }
}

#[async_trait]
impl TopicTransport for InMemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        envelope: MessageEnvelope,
    ) -> Result<MessageId, TransportError> {
        // Every subscriber sees the same message id
        let message_id = MessageId::generate();
        {
            let mut storage = self.storage.lock().await;
            let subscribers =
                storage
                    .topics
                    .get(topic)
                    .cloned()
                    .ok_or_else(|| TransportError::TopicNotFound {
                        topic: topic.to_string(),
                    })?;

            for queue in &subscribers {
                Self::enqueue(
                    &mut storage,
                    queue,
                    envelope.clone(),
                    message_id.clone(),
                    &DeliveryOptions::default(),
                )?;
            }

            debug!(topic = %topic, subscribers = subscribers.len(), "Published message");
        }

        self.arrivals.notify_waiters();
        Ok(message_id)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
