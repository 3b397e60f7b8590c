//! Amazon SNS topic transport over the HTTP query API.
//!
//! Topics are addressed by ARN. The envelope body becomes the SNS `Message`
//! and every envelope attribute becomes a `String` message attribute, so
//! SQS subscriptions with raw message delivery receive the same envelope.

use crate::client::AwsClient;
use crate::config::AwsTransportConfig;
use crate::error::AwsError;
use crate::sqs::{message_attribute_params, param, MAX_MESSAGE_SIZE};
use crate::xml::required_text;
use async_trait::async_trait;
use courier_core::{MessageEnvelope, MessageId, TopicTransport, TransportError};
use std::fmt;
use tracing::info;

const SERVICE: &str = "sns";
const API_VERSION: &str = "2010-03-31";

/// SNS implementation of [`TopicTransport`].
pub struct SnsTransport {
    client: AwsClient,
}

impl SnsTransport {
    /// Build a transport from configuration.
    pub fn new(config: &AwsTransportConfig) -> Result<Self, AwsError> {
        let client = AwsClient::new(config, SERVICE, API_VERSION)?;
        info!(endpoint = %client.endpoint(), region = %config.region, "Created SNS transport");

        Ok(Self { client })
    }

    async fn publish_message(
        &self,
        topic_arn: &str,
        envelope: MessageEnvelope,
    ) -> Result<MessageId, AwsError> {
        let message = std::str::from_utf8(&envelope.body).map_err(|_| AwsError::InvalidUtf8)?;
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(AwsError::MessageTooLarge {
                size: message.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        let mut params = vec![param("TopicArn", topic_arn), param("Message", message)];
        params.extend(message_attribute_params(
            "MessageAttributes.entry",
            &envelope.attributes,
        ));

        let response = self
            .client
            .call("Publish", &params)
            .await
            .map_err(|e| match e {
                AwsError::TopicNotFound(_) => AwsError::TopicNotFound(topic_arn.to_string()),
                other => other,
            })?;

        Ok(MessageId::new(required_text(&response, b"MessageId")?))
    }
}

impl fmt::Debug for SnsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnsTransport")
            .field("endpoint", &self.client.endpoint().as_str())
            .finish()
    }
}

#[async_trait]
impl TopicTransport for SnsTransport {
    async fn publish(
        &self,
        topic: &str,
        envelope: MessageEnvelope,
    ) -> Result<MessageId, TransportError> {
        Ok(self.publish_message(topic, envelope).await?)
    }
}

#[cfg(test)]
#[path = "sns_tests.rs"]
mod tests;
