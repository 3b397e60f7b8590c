//! Tests for XML response helpers.

use super::*;

const SEND_MESSAGE_RESPONSE: &str = r#"<SendMessageResponse>
    <SendMessageResult>
        <MD5OfMessageBody>fafb00f5732ab283681e124bf8747ed1</MD5OfMessageBody>
        <MessageId>5fea7756-0ea4-451a-a703-a558b933e274</MessageId>
    </SendMessageResult>
    <ResponseMetadata>
        <RequestId>27daac76-34dd-47df-bd01-1f6e873584a0</RequestId>
    </ResponseMetadata>
</SendMessageResponse>"#;

#[test]
fn test_first_text_finds_nested_element() {
    assert_eq!(
        first_text(SEND_MESSAGE_RESPONSE, b"MessageId").as_deref(),
        Some("5fea7756-0ea4-451a-a703-a558b933e274")
    );
}

#[test]
fn test_first_text_missing_element() {
    assert_eq!(first_text(SEND_MESSAGE_RESPONSE, b"QueueUrl"), None);
}

#[test]
fn test_first_text_unescapes_entities() {
    let xml = "<Response><Message>a &amp; b &lt;c&gt;</Message></Response>";

    assert_eq!(first_text(xml, b"Message").as_deref(), Some("a & b <c>"));
}

#[test]
fn test_first_text_reads_cdata() {
    let xml = "<Response><Body><![CDATA[{\"x\":1}]]></Body></Response>";

    assert_eq!(first_text(xml, b"Body").as_deref(), Some("{\"x\":1}"));
}

#[test]
fn test_empty_element_yields_empty_text() {
    let xml = "<Response><Detail/></Response>";

    assert_eq!(first_text(xml, b"Detail").as_deref(), Some(""));
}

#[test]
fn test_required_text_names_missing_element() {
    let result = required_text(SEND_MESSAGE_RESPONSE, b"QueueUrl");

    assert!(matches!(result, Err(AwsError::SerializationError(ref message)) if message.contains("QueueUrl")));
}

#[test]
fn test_walk_reports_malformed_xml() {
    let result = walk("<a><b></a>", |_| {});

    assert!(matches!(result, Err(AwsError::SerializationError(_))));
}
