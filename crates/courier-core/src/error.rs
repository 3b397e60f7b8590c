//! Error types for despatch, transport and send operations.

use thiserror::Error;

/// Failure to route or handle a single received envelope.
///
/// Every variant is caught by the poller at the message boundary and turns
/// into a release of the message.
#[derive(Debug, Error)]
pub enum DespatchError {
    /// Neither `AssemblyQualifiedName` nor `Type` carries a usable value.
    #[error("Unable to despatch message {message_id}: no type identity attributes")]
    InvalidMessageContents { message_id: String },

    /// A type identity was present but does not match any registered type.
    #[error("Unable to resolve message type '{identity}'")]
    TypeResolution { identity: String },

    /// The body could not be deserialized into the resolved type.
    #[error("Failed to deserialize message body as '{type_name}': {source}")]
    Deserialization {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The type resolved but no handler is registered for it.
    #[error("Unable to find a message handler for '{type_name}'")]
    HandlerNotFound { type_name: String },

    /// The handler ran and reported an error.
    #[error("Handler for '{type_name}' failed: {source}")]
    HandlerExecution {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DespatchError {
    /// Check if redelivering the same envelope could succeed without an
    /// upstream fix.
    ///
    /// Only handler failures qualify; everything else fails identically on
    /// every delivery.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidMessageContents { .. } => false,
            Self::TypeResolution { .. } => false,
            Self::Deserialization { .. } => false,
            Self::HandlerNotFound { .. } => false,
            Self::HandlerExecution { .. } => true,
        }
    }

    /// Short machine-readable classification used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidMessageContents { .. } => "invalid_message_contents",
            Self::TypeResolution { .. } => "type_resolution_failure",
            Self::Deserialization { .. } => "deserialization_failure",
            Self::HandlerNotFound { .. } => "handler_not_found",
            Self::HandlerExecution { .. } => "handler_execution_failure",
        }
    }
}

/// Failure of a call into the queue or topic service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Queue not found: {queue}")]
    QueueNotFound { queue: String },

    #[error("Topic not found: {topic}")]
    TopicNotFound { topic: String },

    #[error("Receipt handle rejected: {message}")]
    InvalidReceipt { message: String },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Permission denied for operation: {operation}")]
    PermissionDenied { operation: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },
}

impl TransportError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::TopicNotFound { .. } => false,
            Self::InvalidReceipt { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::PermissionDenied { .. } => false,
            Self::MessageTooLarge { .. } => false,
            Self::InvalidUtf8 => false,
            Self::MalformedResponse { .. } => true,
            Self::ProviderError { .. } => true, // Provider-specific errors are usually transient
        }
    }
}

/// Failure to build or hand over an outgoing envelope.
#[derive(Debug, Error)]
pub enum SendError {
    /// A caller-supplied attribute used one of the reserved attribute keys.
    #[error("Attribute '{key}' is reserved and cannot be supplied by the caller")]
    ReservedAttribute { key: String },

    #[error("Failed to serialize message '{type_name}': {source}")]
    Serialization {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A string that is not a usable correlation id.
#[derive(Debug, Error)]
pub enum CorrelationIdError {
    #[error("Correlation id is not a UUID: {0}")]
    Malformed(#[from] uuid::Error),

    #[error("The nil UUID is not a valid correlation id")]
    Nil,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
