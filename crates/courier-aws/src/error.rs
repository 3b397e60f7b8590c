//! AWS-specific errors and their mapping onto [`TransportError`].

use courier_core::TransportError;
use thiserror::Error;

/// Errors raised by the SQS and SNS transports
#[derive(Debug, Error)]
pub enum AwsError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{service} service error: {code} - {message}")]
    ServiceError {
        service: &'static str,
        code: String,
        message: String,
    },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Unexpected response: {0}")]
    SerializationError(String),
}

impl AwsError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::AccessDenied(_) => false,
            Self::NetworkError(_) => true,
            Self::Timeout(_) => true,
            Self::ServiceError { .. } => true,
            Self::QueueNotFound(_) => false,
            Self::TopicNotFound(_) => false,
            Self::InvalidReceipt(_) => false,
            Self::MessageTooLarge { .. } => false,
            Self::InvalidUtf8 => false,
            Self::ConfigurationError(_) => false,
            Self::SerializationError(_) => true,
        }
    }
}

impl From<AwsError> for TransportError {
    fn from(error: AwsError) -> Self {
        match error {
            AwsError::Authentication(message) => TransportError::AuthenticationFailed { message },
            AwsError::AccessDenied(operation) => TransportError::PermissionDenied { operation },
            AwsError::NetworkError(message) => TransportError::ConnectionFailed { message },
            AwsError::Timeout(message) => TransportError::Timeout { message },
            AwsError::ServiceError {
                service,
                code,
                message,
            } => TransportError::ProviderError {
                provider: service.to_string(),
                code,
                message,
            },
            AwsError::QueueNotFound(queue) => TransportError::QueueNotFound { queue },
            AwsError::TopicNotFound(topic) => TransportError::TopicNotFound { topic },
            AwsError::InvalidReceipt(message) => TransportError::InvalidReceipt { message },
            AwsError::MessageTooLarge { size, max_size } => {
                TransportError::MessageTooLarge { size, max_size }
            }
            AwsError::InvalidUtf8 => TransportError::InvalidUtf8,
            AwsError::ConfigurationError(message) => TransportError::ProviderError {
                provider: "aws".to_string(),
                code: "ConfigurationError".to_string(),
                message,
            },
            AwsError::SerializationError(message) => TransportError::MalformedResponse {
                provider: "aws".to_string(),
                message,
            },
        }
    }
}

/// Map an AWS query-protocol error document onto an [`AwsError`].
pub(crate) fn parse_error_response(service: &'static str, xml: &str, status_code: u16) -> AwsError {
    let code = crate::xml::first_text(xml, b"Code").unwrap_or_else(|| "Unknown".to_string());
    let message =
        crate::xml::first_text(xml, b"Message").unwrap_or_else(|| "Unknown error".to_string());

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            AwsError::QueueNotFound(message)
        }
        "NotFound" => AwsError::TopicNotFound(message),
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "ExpiredToken"
        | "MissingAuthenticationToken" => {
            AwsError::Authentication(format!("{}: {}", code, message))
        }
        "AccessDenied" | "AccessDeniedException" | "AuthorizationError" => {
            AwsError::AccessDenied(format!("{}: {}", code, message))
        }
        "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" | "MessageNotInflight" => {
            AwsError::InvalidReceipt(message)
        }
        _ if status_code == 401 => AwsError::Authentication(format!("{}: {}", code, message)),
        _ if status_code == 403 => AwsError::AccessDenied(format!("{}: {}", code, message)),
        _ => AwsError::ServiceError {
            service,
            code,
            message,
        },
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
