//! JSON batch codec.
//!
//! A batch is a JSON array with one entry per message:
//!
//! ```text
//! [{"body":"<base64>","properties":{"iothub-app-k":"v"}},
//!  {"body":"text","base64Encoded":false}]
//! ```
//!
//! Binary bodies are base64-encoded. Text bodies are embedded as JSON
//! strings and flagged with `"base64Encoded":false`. The `properties`
//! object is omitted when a message has none.

use crate::error::MessageResult;
use crate::message::{Message, MessageBody, Properties};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// Prefix applied to application property names on the wire.
pub const APP_PROPERTY_PREFIX: &str = "iothub-app-";

#[derive(Serialize)]
struct BatchEntry<'a> {
    body: Cow<'a, str>,
    #[serde(rename = "base64Encoded", skip_serializing_if = "Option::is_none")]
    base64_encoded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<AppProperties<'a>>,
}

impl<'a> BatchEntry<'a> {
    fn new(message: &'a Message) -> Self {
        let (body, base64_encoded) = match message.body() {
            MessageBody::Binary(bytes) => (Cow::Owned(STANDARD.encode(bytes)), None),
            MessageBody::Text(text) => (Cow::Borrowed(text.as_str()), Some(false)),
        };
        let properties = message.properties();
        Self {
            body,
            base64_encoded,
            properties: (!properties.is_empty()).then_some(AppProperties(properties)),
        }
    }
}

/// Serializes properties as an object with prefixed keys, in insertion order.
struct AppProperties<'a>(&'a Properties);

impl Serialize for AppProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(&format!("{APP_PROPERTY_PREFIX}{key}"), value)?;
        }
        map.end()
    }
}

/// Encodes a single batch entry.
pub fn encode_entry(message: &Message) -> MessageResult<Vec<u8>> {
    Ok(serde_json::to_vec(&BatchEntry::new(message))?)
}

/// Incrementally builds a batch body.
///
/// Entries are written in push order; a failed push leaves the batch
/// unchanged.
#[derive(Debug, Default)]
pub struct BatchWriter {
    buf: Vec<u8>,
    count: usize,
}

impl BatchWriter {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message to the batch.
    pub fn push(&mut self, message: &Message) -> MessageResult<()> {
        let entry = encode_entry(message)?;
        self.buf.push(if self.count == 0 { b'[' } else { b',' });
        self.buf.extend_from_slice(&entry);
        self.count += 1;
        Ok(())
    }

    /// Returns the number of entries written.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no entries were written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Closes the array and returns the body.
    pub fn finish(mut self) -> Vec<u8> {
        if self.count == 0 {
            self.buf.push(b'[');
        }
        self.buf.push(b']');
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_string(message: &Message) -> String {
        String::from_utf8(encode_entry(message).unwrap()).unwrap()
    }

    #[test]
    fn binary_entry_is_base64() {
        let msg = Message::from_bytes(b"hello".to_vec());
        assert_eq!(entry_string(&msg), r#"{"body":"aGVsbG8="}"#);
    }

    #[test]
    fn text_entry_is_json_string() {
        let msg = Message::from_text("say \"hi\"");
        assert_eq!(
            entry_string(&msg),
            r#"{"body":"say \"hi\"","base64Encoded":false}"#
        );
    }

    #[test]
    fn properties_are_prefixed_in_order() {
        let msg = Message::from_bytes(vec![0xff])
            .with_property("b", "2")
            .with_property("a", "1");
        assert_eq!(
            entry_string(&msg),
            r#"{"body":"/w==","properties":{"iothub-app-b":"2","iothub-app-a":"1"}}"#
        );
    }

    #[test]
    fn property_values_are_escaped() {
        let msg = Message::from_text("x").with_property("k", "a\"b");
        assert_eq!(
            entry_string(&msg),
            r#"{"body":"x","base64Encoded":false,"properties":{"iothub-app-k":"a\"b"}}"#
        );
    }

    #[test]
    fn writer_builds_array() {
        let mut writer = BatchWriter::new();
        writer.push(&Message::from_text("a")).unwrap();
        writer.push(&Message::from_bytes(vec![1])).unwrap();
        assert_eq!(writer.len(), 2);

        let body = String::from_utf8(writer.finish()).unwrap();
        assert_eq!(
            body,
            r#"[{"body":"a","base64Encoded":false},{"body":"AQ=="}]"#
        );

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn empty_writer_is_empty_array() {
        let writer = BatchWriter::new();
        assert!(writer.is_empty());
        assert_eq!(writer.finish(), b"[]");
    }
}
