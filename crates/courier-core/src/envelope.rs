//! Envelope types exchanged with the queue and topic transports.
//!
//! An envelope is a body blob plus a map of string attributes. Three attribute
//! keys are reserved: two identify the logical message type and one carries the
//! correlation id. See [`attributes`].

use crate::error::CorrelationIdError;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Reserved Attributes
// ============================================================================

/// Reserved attribute keys.
pub mod attributes {
    /// Fully-qualified type identity of the body.
    pub const ASSEMBLY_QUALIFIED_NAME: &str = "AssemblyQualifiedName";

    /// Short type name of the body.
    pub const TYPE: &str = "Type";

    /// Correlation id as a UUID string.
    pub const CORRELATION_ID: &str = "CorrelationId";

    /// All keys owned by envelope construction.
    pub const RESERVED: [&str; 3] = [ASSEMBLY_QUALIFIED_NAME, TYPE, CORRELATION_ID];

    /// Check whether a key is reserved. Keys are case-sensitive.
    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A domain message that can travel inside an envelope.
///
/// Implementations must be registered in a [`TypeRegistry`](crate::TypeRegistry)
/// on the receiving side to be routable.
///
/// ```rust
/// use courier_core::CourierMessage;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderPlaced {
///     order_id: u64,
/// }
///
/// impl CourierMessage for OrderPlaced {
///     const TYPE_NAME: &'static str = "OrderPlaced";
/// }
///
/// assert!(OrderPlaced::qualified_name().ends_with("OrderPlaced"));
/// ```
pub trait CourierMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Short type name, carried in the `Type` attribute.
    const TYPE_NAME: &'static str;

    /// Fully-qualified type identity, carried in the `AssemblyQualifiedName`
    /// attribute.
    ///
    /// Defaults to the Rust type path. Override it when senders and receivers
    /// are built from different crates and need a stable identity.
    fn qualified_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Transport-assigned message identifier, used for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a transport-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier, for transports that do not assign one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier threaded through the processing of one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh random correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an attribute value as a correlation id.
    ///
    /// Returns `None` for values that are not UUIDs and for the nil UUID.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim())
            .ok()
            .filter(|uuid| !uuid.is_nil())
            .map(Self)
    }

    /// Use the attribute value when it is a valid correlation id, otherwise
    /// generate a fresh one.
    pub fn from_attribute(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strict parse: rejects the nil UUID like [`CorrelationId::parse`] does.
impl FromStr for CorrelationId {
    type Err = CorrelationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s.trim())?;
        if uuid.is_nil() {
            return Err(CorrelationIdError::Nil);
        }
        Ok(Self(uuid))
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// Body plus string attributes, as stored on the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    /// Set by the transport on received envelopes.
    pub message_id: Option<MessageId>,
    pub body: Bytes,
    pub attributes: HashMap<String, String>,
}

impl MessageEnvelope {
    /// Create new envelope with body
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set the transport-assigned message id
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Add message attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Get an attribute value, treating empty and whitespace-only values as absent.
    pub fn non_blank_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).filter(|value| !value.trim().is_empty())
    }

    /// Correlation id carried by the envelope, or a fresh one.
    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_attribute(self.attribute(attributes::CORRELATION_ID))
    }

    /// Message id for log fields; `-` when the transport assigned none.
    pub fn log_id(&self) -> &str {
        self.message_id.as_ref().map_or("-", MessageId::as_str)
    }
}

/// Capability to delete or release one received message.
///
/// Not `Clone`: the terminal transport operations take it by value, so a
/// received message reaches exactly one of them.
#[derive(Debug, PartialEq, Eq)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Wrap a transport-assigned receipt handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An envelope together with the receipt handle of the receive that returned it.
#[derive(Debug)]
pub struct ReceivedEnvelope {
    envelope: MessageEnvelope,
    receipt_handle: ReceiptHandle,
    receive_count: u32,
}

impl ReceivedEnvelope {
    /// Create a received envelope
    pub fn new(envelope: MessageEnvelope, receipt_handle: ReceiptHandle, receive_count: u32) -> Self {
        Self {
            envelope,
            receipt_handle,
            receive_count,
        }
    }

    /// Borrow the envelope
    pub fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }

    /// Number of times the transport has handed out this message, when known.
    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// Separate the envelope from its receipt handle.
    pub fn into_parts(self) -> (MessageEnvelope, ReceiptHandle) {
        (self.envelope, self.receipt_handle)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
