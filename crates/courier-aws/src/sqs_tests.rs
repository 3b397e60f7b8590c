//! Tests for the SQS transport.
//!
//! HTTP calls go to a local `wiremock` server through the endpoint override.

use super::*;
use courier_core::attributes;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Helper Functions
// ============================================================================

const RECEIVE_TWO_MESSAGES: &str = r#"<?xml version="1.0"?>
<ReceiveMessageResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <ReceiveMessageResult>
    <Message>
      <MessageId>5fea7756-0ea4-451a-a703-a558b933e274</MessageId>
      <ReceiptHandle>MbZj6wDWli+JvwwJaBV+3dcjk2YW2vA3+STFFljTM8tJJg6HRG6PYSasuWXPJB+Cw==</ReceiptHandle>
      <MD5OfBody>fafb00f5732ab283681e124bf8747ed1</MD5OfBody>
      <Body>{&quot;order_id&quot;:7}</Body>
      <Attribute>
        <Name>ApproximateReceiveCount</Name>
        <Value>3</Value>
      </Attribute>
      <MessageAttribute>
        <Name>Type</Name>
        <Value>
          <StringValue>OrderPlaced</StringValue>
          <DataType>String</DataType>
        </Value>
      </MessageAttribute>
      <MessageAttribute>
        <Name>CorrelationId</Name>
        <Value>
          <StringValue>0f8fad5b-d9cb-469f-a165-70867728950e</StringValue>
          <DataType>String</DataType>
        </Value>
      </MessageAttribute>
    </Message>
    <Message>
      <MessageId>second</MessageId>
      <ReceiptHandle>receipt-2</ReceiptHandle>
      <Body>plain text</Body>
    </Message>
  </ReceiveMessageResult>
  <ResponseMetadata>
    <RequestId>b6633655-283d-45b4-aee4-4e84e0ae6afa</RequestId>
  </ResponseMetadata>
</ReceiveMessageResponse>"#;

const EMPTY_RECEIVE: &str = r#"<ReceiveMessageResponse>
  <ReceiveMessageResult/>
  <ResponseMetadata><RequestId>r</RequestId></ResponseMetadata>
</ReceiveMessageResponse>"#;

fn send_message_response(message_id: &str) -> String {
    format!(
        "<SendMessageResponse><SendMessageResult><MessageId>{}</MessageId></SendMessageResult></SendMessageResponse>",
        message_id
    )
}

fn ok_xml(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body.into())
}

fn error_xml(status: u16, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_string(format!(
        "<ErrorResponse><Error><Type>Sender</Type><Code>{}</Code><Message>{} from test</Message></Error></ErrorResponse>",
        code, code
    ))
}

fn transport_for(server: &MockServer) -> SqsTransport {
    let config = AwsTransportConfig::new("us-east-1")
        .with_endpoint(server.uri())
        .with_credentials("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
    SqsTransport::new(&config).unwrap()
}

fn queue_url(server: &MockServer) -> String {
    format!("{}/123456789012/orders", server.uri())
}

fn encoded(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

// ============================================================================
// Response Parsing Tests
// ============================================================================

mod response_parsing {
    use super::*;

    #[test]
    fn test_parse_receive_response() {
        let messages = parse_receive_message_response(RECEIVE_TWO_MESSAGES).unwrap();
        assert_eq!(messages.len(), 2);

        let mut messages = messages.into_iter();
        let first = messages.next().unwrap();
        assert_eq!(first.receive_count(), 3);

        let (envelope, receipt) = first.into_parts();
        assert_eq!(
            receipt.as_str(),
            "MbZj6wDWli+JvwwJaBV+3dcjk2YW2vA3+STFFljTM8tJJg6HRG6PYSasuWXPJB+Cw=="
        );
        assert_eq!(envelope.log_id(), "5fea7756-0ea4-451a-a703-a558b933e274");
        assert_eq!(&envelope.body[..], br#"{"order_id":7}"#);
        assert_eq!(envelope.attribute(attributes::TYPE), Some("OrderPlaced"));
        assert_eq!(
            envelope.attribute(attributes::CORRELATION_ID),
            Some("0f8fad5b-d9cb-469f-a165-70867728950e")
        );
        assert_eq!(envelope.attributes.len(), 2);

        let second = messages.next().unwrap();
        assert_eq!(second.receive_count(), 1);
        let (envelope, _) = second.into_parts();
        assert_eq!(&envelope.body[..], b"plain text");
        assert!(envelope.attributes.is_empty());
    }

    #[test]
    fn test_parse_empty_receive_response() {
        let messages = parse_receive_message_response(EMPTY_RECEIVE).unwrap();

        assert!(messages.is_empty());
    }

    #[test]
    fn test_message_without_receipt_is_rejected() {
        let xml = "<ReceiveMessageResponse><ReceiveMessageResult><Message><MessageId>m</MessageId><Body>x</Body></Message></ReceiveMessageResult></ReceiveMessageResponse>";

        let result = parse_receive_message_response(xml);

        assert!(matches!(result, Err(AwsError::SerializationError(_))));
    }

    #[test]
    fn test_message_attribute_params_are_sorted_and_numbered() {
        let attributes = HashMap::from([
            ("Type".to_string(), "OrderPlaced".to_string()),
            ("AssemblyQualifiedName".to_string(), "Shop.OrderPlaced".to_string()),
        ]);

        let params = message_attribute_params("MessageAttribute", &attributes);

        assert_eq!(
            params,
            vec![
                param("MessageAttribute.1.Name", "AssemblyQualifiedName"),
                param("MessageAttribute.1.Value.DataType", "String"),
                param("MessageAttribute.1.Value.StringValue", "Shop.OrderPlaced"),
                param("MessageAttribute.2.Name", "Type"),
                param("MessageAttribute.2.Value.DataType", "String"),
                param("MessageAttribute.2.Value.StringValue", "OrderPlaced"),
            ]
        );
    }
}

// ============================================================================
// Queue URL Resolution Tests
// ============================================================================

mod queue_url_resolution {
    use super::*;

    #[tokio::test]
    async fn test_url_identifier_is_used_directly() {
        let server = MockServer::start().await;
        let transport = transport_for(&server);

        let url = transport
            .queue_url("https://sqs.us-east-1.amazonaws.com/123456789012/orders")
            .await
            .unwrap();

        assert_eq!(url, "https://sqs.us-east-1.amazonaws.com/123456789012/orders");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_is_resolved_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("Action=GetQueueUrl"))
            .and(body_string_contains("QueueName=orders"))
            .respond_with(ok_xml(format!(
                "<GetQueueUrlResponse><GetQueueUrlResult><QueueUrl>{}</QueueUrl></GetQueueUrlResult></GetQueueUrlResponse>",
                queue_url(&server)
            )))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);

        let first = transport.queue_url("orders").await.unwrap();
        let second = transport.queue_url("orders").await.unwrap();

        assert_eq!(first, queue_url(&server));
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_unknown_queue_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=GetQueueUrl"))
            .respond_with(error_xml(400, "AWS.SimpleQueueService.NonExistentQueue"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .receive("missing", ReceiveRequest::default())
            .await;

        assert!(matches!(
            result,
            Err(TransportError::QueueNotFound { ref queue }) if queue == "missing"
        ));
    }
}

// ============================================================================
// Queue Operation Tests
// ============================================================================

mod queue_operations {
    use super::*;

    #[tokio::test]
    async fn test_receive_sends_signed_request_with_parameters() {
        let server = MockServer::start().await;
        let queue = queue_url(&server);
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(body_string_contains("Action=ReceiveMessage"))
            .and(body_string_contains("Version=2012-11-05"))
            .and(body_string_contains(format!("QueueUrl={}", encoded(&queue))))
            .and(body_string_contains("MaxNumberOfMessages=1"))
            .and(body_string_contains("WaitTimeSeconds=20"))
            .and(body_string_contains("VisibilityTimeout=43200"))
            .and(body_string_contains("MessageAttributeName.1=All"))
            .respond_with(ok_xml(RECEIVE_TWO_MESSAGES))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let messages = transport
            .receive(
                &queue,
                ReceiveRequest {
                    max_messages: 1,
                    wait_time_seconds: 20,
                    visibility_timeout_seconds: 43_200,
                },
            )
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_receive_batch_size_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("MaxNumberOfMessages=10"))
            .respond_with(ok_xml(EMPTY_RECEIVE))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let request = ReceiveRequest {
            max_messages: 50,
            ..ReceiveRequest::default()
        };

        let messages = transport
            .receive(&queue_url(&server), request)
            .await
            .unwrap();

        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_delete_sends_receipt_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=DeleteMessage"))
            .and(body_string_contains(format!(
                "ReceiptHandle={}",
                encoded("AQEB+abc/def==")
            )))
            .respond_with(ok_xml("<DeleteMessageResponse/>"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .delete(&queue_url(&server), ReceiptHandle::new("AQEB+abc/def=="))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_release_sets_zero_visibility() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=ChangeMessageVisibility"))
            .and(body_string_contains("ReceiptHandle=receipt-1"))
            .and(body_string_contains("VisibilityTimeout=0"))
            .respond_with(ok_xml("<ChangeMessageVisibilityResponse/>"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .change_visibility(&queue_url(&server), ReceiptHandle::new("receipt-1"), 0)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_receipt_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_xml(400, "ReceiptHandleIsInvalid"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .delete(&queue_url(&server), ReceiptHandle::new("stale"))
            .await;

        assert!(matches!(result, Err(TransportError::InvalidReceipt { .. })));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_xml(500, "InternalError"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .receive(&queue_url(&server), ReceiveRequest::default())
            .await;

        match result {
            Err(error @ TransportError::ProviderError { .. }) => assert!(error.is_transient()),
            other => panic!("unexpected result: {:?}", other.map(|m| m.len())),
        }
    }

    #[tokio::test]
    async fn test_signature_rejection_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_xml(403, "SignatureDoesNotMatch"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .receive(&queue_url(&server), ReceiveRequest::default())
            .await;

        assert!(matches!(result, Err(TransportError::AuthenticationFailed { .. })));
    }
}

// ============================================================================
// Send Tests
// ============================================================================

mod send {
    use super::*;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope::new(r#"{"order_id":7}"#)
            .with_attribute(attributes::ASSEMBLY_QUALIFIED_NAME, "Shop.OrderPlaced")
            .with_attribute(attributes::TYPE, "OrderPlaced")
            .with_attribute(
                attributes::CORRELATION_ID,
                "0f8fad5b-d9cb-469f-a165-70867728950e",
            )
    }

    #[tokio::test]
    async fn test_send_maps_body_and_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=SendMessage"))
            .and(body_string_contains(format!(
                "MessageBody={}",
                encoded(r#"{"order_id":7}"#)
            )))
            .and(body_string_contains(
                "MessageAttribute.1.Name=AssemblyQualifiedName",
            ))
            .and(body_string_contains(
                "MessageAttribute.2.Name=CorrelationId",
            ))
            .and(body_string_contains("MessageAttribute.3.Name=Type"))
            .and(body_string_contains(
                "MessageAttribute.3.Value.StringValue=OrderPlaced",
            ))
            .and(body_string_contains("MessageAttribute.3.Value.DataType=String"))
            .respond_with(ok_xml(send_message_response("msg-123")))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let message_id = transport
            .send(&queue_url(&server), envelope(), DeliveryOptions::default())
            .await
            .unwrap();

        assert_eq!(message_id.as_str(), "msg-123");
    }

    #[tokio::test]
    async fn test_send_includes_fifo_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("MessageDeduplicationId=order-7"))
            .and(body_string_contains("MessageGroupId=customer-1"))
            .respond_with(ok_xml(send_message_response("msg-fifo")))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let options = DeliveryOptions {
            deduplication_id: Some("order-7".to_string()),
            message_group_id: Some("customer-1".to_string()),
        };

        let result = transport
            .send(&queue_url(&server), envelope(), options)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_rejected_locally() {
        let server = MockServer::start().await;
        let transport = transport_for(&server);

        let result = transport
            .send(
                &queue_url(&server),
                MessageEnvelope::new(vec![0xff, 0xfe, 0x00]),
                DeliveryOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(TransportError::InvalidUtf8)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_locally() {
        let server = MockServer::start().await;
        let transport = transport_for(&server);

        let result = transport
            .send(
                &queue_url(&server),
                MessageEnvelope::new("x".repeat(MAX_MESSAGE_SIZE + 1)),
                DeliveryOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(TransportError::MessageTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_session_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-security-token", "session-token"))
            .respond_with(ok_xml(send_message_response("msg-1")))
            .expect(1)
            .mount(&server)
            .await;

        let config = AwsTransportConfig::new("us-east-1")
            .with_endpoint(server.uri())
            .with_credentials("AKIDEXAMPLE", "secret")
            .with_session_token("session-token");
        let transport = SqsTransport::new(&config).unwrap();

        let result = transport
            .send(&queue_url(&server), envelope(), DeliveryOptions::default())
            .await;

        assert!(result.is_ok());
    }
}

// ============================================================================
// Construction Tests
// ============================================================================

mod construction {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_credentials_fail_construction() {
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");

        let result = SqsTransport::new(&AwsTransportConfig::new("us-east-1"));

        assert!(matches!(result, Err(AwsError::ConfigurationError(_))));
    }

    #[test]
    fn test_debug_does_not_expose_credentials() {
        let config = AwsTransportConfig::new("us-east-1")
            .with_endpoint("http://localhost:4566")
            .with_credentials("AKIDEXAMPLE", "super-secret");
        let transport = SqsTransport::new(&config).unwrap();

        let debug = format!("{:?}", transport);

        assert!(debug.contains("localhost:4566"));
        assert!(!debug.contains("super-secret"));
    }
}
