//! Amazon SQS queue transport over the HTTP query API.
//!
//! ## Queue identifiers
//!
//! A queue identifier that is an `http(s)://` URL is used as-is. Anything else
//! is treated as a queue name and resolved once through `GetQueueUrl`; the
//! resolved URL is cached for the lifetime of the transport.
//!
//! ## Envelope mapping
//!
//! - Body: sent and received as the `MessageBody` string, so it must be UTF-8
//! - Attributes: one `String` message attribute per envelope attribute
//! - Receive count: the `ApproximateReceiveCount` system attribute

use crate::client::AwsClient;
use crate::config::AwsTransportConfig;
use crate::error::AwsError;
use crate::xml::{required_text, walk, XmlEvent};
use async_trait::async_trait;
use courier_core::{
    DeliveryOptions, MessageEnvelope, MessageId, QueueTransport, ReceiptHandle, ReceiveRequest,
    ReceivedEnvelope, TransportError,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const SERVICE: &str = "sqs";
const API_VERSION: &str = "2012-11-05";

/// Largest message SQS accepts (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// Most messages a single ReceiveMessage call can return
pub const MAX_RECEIVE_BATCH: u32 = 10;

/// SQS implementation of [`QueueTransport`].
pub struct SqsTransport {
    client: AwsClient,
    queue_url_cache: Arc<RwLock<HashMap<String, String>>>,
}

impl SqsTransport {
    /// Build a transport from configuration.
    ///
    /// Fails when the configuration is invalid or no credentials can be found.
    pub fn new(config: &AwsTransportConfig) -> Result<Self, AwsError> {
        let client = AwsClient::new(config, SERVICE, API_VERSION)?;
        info!(endpoint = %client.endpoint(), region = %config.region, "Created SQS transport");

        Ok(Self {
            client,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Resolve a queue name or URL to a queue URL.
    pub async fn queue_url(&self, queue: &str) -> Result<String, AwsError> {
        if queue.starts_with("https://") || queue.starts_with("http://") {
            return Ok(queue.to_string());
        }

        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(queue) {
                return Ok(url.clone());
            }
        }

        let response = self
            .client
            .call("GetQueueUrl", &[param("QueueName", queue)])
            .await
            .map_err(|e| match e {
                AwsError::QueueNotFound(_) => AwsError::QueueNotFound(queue.to_string()),
                other => other,
            })?;
        let queue_url = required_text(&response, b"QueueUrl")?;

        debug!(queue = %queue, queue_url = %queue_url, "Resolved queue URL");

        let mut cache = self.queue_url_cache.write().await;
        cache.insert(queue.to_string(), queue_url.clone());
        Ok(queue_url)
    }

    async fn receive_messages(
        &self,
        queue: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedEnvelope>, AwsError> {
        let queue_url = self.queue_url(queue).await?;

        let params = [
            param("QueueUrl", &queue_url),
            param(
                "MaxNumberOfMessages",
                request.max_messages.clamp(1, MAX_RECEIVE_BATCH).to_string(),
            ),
            param("WaitTimeSeconds", request.wait_time_seconds.to_string()),
            param(
                "VisibilityTimeout",
                request.visibility_timeout_seconds.to_string(),
            ),
            param("MessageAttributeName.1", "All"),
            param("AttributeName.1", "ApproximateReceiveCount"),
        ];

        let response = self.client.call("ReceiveMessage", &params).await?;
        parse_receive_message_response(&response)
    }

    async fn delete_message(&self, queue: &str, receipt: ReceiptHandle) -> Result<(), AwsError> {
        let queue_url = self.queue_url(queue).await?;

        self.client
            .call(
                "DeleteMessage",
                &[
                    param("QueueUrl", &queue_url),
                    param("ReceiptHandle", receipt.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn change_message_visibility(
        &self,
        queue: &str,
        receipt: ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), AwsError> {
        let queue_url = self.queue_url(queue).await?;

        self.client
            .call(
                "ChangeMessageVisibility",
                &[
                    param("QueueUrl", &queue_url),
                    param("ReceiptHandle", receipt.as_str()),
                    param("VisibilityTimeout", visibility_timeout_seconds.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
        options: DeliveryOptions,
    ) -> Result<MessageId, AwsError> {
        let body = std::str::from_utf8(&envelope.body).map_err(|_| AwsError::InvalidUtf8)?;
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(AwsError::MessageTooLarge {
                size: body.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        let queue_url = self.queue_url(queue).await?;

        let mut params = vec![param("QueueUrl", &queue_url), param("MessageBody", body)];
        params.extend(message_attribute_params(
            "MessageAttribute",
            &envelope.attributes,
        ));
        if let Some(deduplication_id) = options.deduplication_id {
            params.push(param("MessageDeduplicationId", deduplication_id));
        }
        if let Some(message_group_id) = options.message_group_id {
            params.push(param("MessageGroupId", message_group_id));
        }

        let response = self.client.call("SendMessage", &params).await?;
        Ok(MessageId::new(required_text(&response, b"MessageId")?))
    }
}

impl fmt::Debug for SqsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsTransport")
            .field("endpoint", &self.client.endpoint().as_str())
            .finish()
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(
        &self,
        queue: &str,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedEnvelope>, TransportError> {
        Ok(self.receive_messages(queue, request).await?)
    }

    async fn delete(&self, queue: &str, receipt: ReceiptHandle) -> Result<(), TransportError> {
        Ok(self.delete_message(queue, receipt).await?)
    }

    async fn change_visibility(
        &self,
        queue: &str,
        receipt: ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError> {
        Ok(self
            .change_message_visibility(queue, receipt, visibility_timeout_seconds)
            .await?)
    }

    async fn send(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
        options: DeliveryOptions,
    ) -> Result<MessageId, TransportError> {
        Ok(self.send_message(queue, envelope, options).await?)
    }
}

// ============================================================================
// Request and Response Mapping
// ============================================================================

pub(crate) fn param(name: impl Into<String>, value: impl Into<String>) -> (String, String) {
    (name.into(), value.into())
}

/// Flatten string attributes into `{prefix}.N.Name` / `.Value.*` parameters.
///
/// SQS numbers entries `MessageAttribute.N`; SNS uses
/// `MessageAttributes.entry.N`. Entries are ordered by key.
pub(crate) fn message_attribute_params(
    prefix: &str,
    attributes: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();

    keys.into_iter()
        .enumerate()
        .flat_map(|(index, key)| {
            let entry = format!("{}.{}", prefix, index + 1);
            [
                param(format!("{}.Name", entry), key.as_str()),
                param(format!("{}.Value.DataType", entry), "String"),
                param(
                    format!("{}.Value.StringValue", entry),
                    attributes[key].as_str(),
                ),
            ]
        })
        .collect()
}

#[derive(Default)]
struct MessageFields {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: String,
    receive_count: Option<u32>,
    attributes: HashMap<String, String>,
}

/// Parse a ReceiveMessage response into received envelopes.
///
/// Messages without a receipt handle cannot be acknowledged and are
/// rejected as a malformed response.
pub(crate) fn parse_receive_message_response(
    xml: &str,
) -> Result<Vec<ReceivedEnvelope>, AwsError> {
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut completed: Vec<MessageFields> = Vec::new();
    let mut current: Option<MessageFields> = None;
    let mut attribute_name: Option<String> = None;
    let mut text = String::new();

    walk(xml, |event| match event {
        XmlEvent::Start(name) => {
            if name == b"Message" {
                current = Some(MessageFields::default());
            }
            path.push(name.to_vec());
            text.clear();
        }
        XmlEvent::Text(value) => text.push_str(value),
        XmlEvent::End(name) => {
            path.pop();
            let parent = path.last().map(Vec::as_slice);
            let value = std::mem::take(&mut text);

            let Some(fields) = current.as_mut() else {
                return;
            };

            match (name, parent) {
                (b"MessageId", Some(b"Message")) => fields.message_id = Some(value),
                (b"ReceiptHandle", Some(b"Message")) => fields.receipt_handle = Some(value),
                (b"Body", Some(b"Message")) => fields.body = value,
                (b"Name", Some(b"Attribute")) | (b"Name", Some(b"MessageAttribute")) => {
                    attribute_name = Some(value)
                }
                (b"Value", Some(b"Attribute")) => {
                    if attribute_name.as_deref() == Some("ApproximateReceiveCount") {
                        fields.receive_count = value.trim().parse().ok();
                    }
                }
                (b"StringValue", Some(b"Value")) => {
                    if let Some(key) = attribute_name.clone() {
                        fields.attributes.insert(key, value);
                    }
                }
                (b"Attribute", _) | (b"MessageAttribute", _) => attribute_name = None,
                (b"Message", _) => {
                    if let Some(fields) = current.take() {
                        completed.push(fields);
                    }
                }
                _ => {}
            }
        }
    })?;

    completed
        .into_iter()
        .map(|fields| {
            let receipt_handle = fields.receipt_handle.ok_or_else(|| {
                AwsError::SerializationError("Message without ReceiptHandle".to_string())
            })?;

            let mut envelope = MessageEnvelope::new(fields.body);
            envelope.attributes = fields.attributes;
            if let Some(message_id) = fields.message_id {
                envelope = envelope.with_message_id(MessageId::new(message_id));
            }

            Ok(ReceivedEnvelope::new(
                envelope,
                ReceiptHandle::new(receipt_handle),
                fields.receive_count.unwrap_or(1),
            ))
        })
        .collect()
}

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;
