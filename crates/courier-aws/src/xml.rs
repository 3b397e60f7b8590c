//! Minimal XML reading for AWS query-protocol responses.

use crate::error::AwsError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Structural events passed to a [`walk`] visitor.
pub(crate) enum XmlEvent<'a> {
    Start(&'a [u8]),
    Text(&'a str),
    End(&'a [u8]),
}

/// Walk `xml`, reporting element boundaries and unescaped text.
///
/// Self-closing elements are reported as a start immediately followed by an
/// end. Text inside CDATA sections is reported like ordinary text.
pub(crate) fn walk(xml: &str, mut visit: impl FnMut(XmlEvent<'_>)) -> Result<(), AwsError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => visit(XmlEvent::Start(e.name().as_ref())),
            Ok(Event::Empty(ref e)) => {
                visit(XmlEvent::Start(e.name().as_ref()));
                visit(XmlEvent::End(e.name().as_ref()));
            }
            Ok(Event::End(ref e)) => visit(XmlEvent::End(e.name().as_ref())),
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| {
                    AwsError::SerializationError(format!("Failed to unescape XML text: {}", e))
                })?;
                visit(XmlEvent::Text(&text));
            }
            Ok(Event::CData(ref e)) => {
                let text = std::str::from_utf8(e).map_err(|e| {
                    AwsError::SerializationError(format!("Invalid UTF-8 in CDATA: {}", e))
                })?;
                visit(XmlEvent::Text(text));
            }
            Ok(Event::Eof) => return Ok(()),
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Text of the first element named `tag`, if any.
pub(crate) fn first_text(xml: &str, tag: &[u8]) -> Option<String> {
    let mut capturing = false;
    let mut done = false;
    let mut text = String::new();

    walk(xml, |event| match event {
        XmlEvent::Start(name) if !done && name == tag => capturing = true,
        XmlEvent::Text(value) if capturing => text.push_str(value),
        XmlEvent::End(name) if capturing && name == tag => {
            capturing = false;
            done = true;
        }
        _ => {}
    })
    .ok()?;

    done.then_some(text)
}

/// Text of the first element named `tag`, or a serialization error naming
/// the missing element.
pub(crate) fn required_text(xml: &str, tag: &[u8]) -> Result<String, AwsError> {
    first_text(xml, tag).ok_or_else(|| {
        AwsError::SerializationError(format!(
            "{} not found in response",
            String::from_utf8_lossy(tag)
        ))
    })
}

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;
