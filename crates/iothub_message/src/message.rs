//! Device messages.

use crate::size::accounted_size;

/// The payload of a message.
///
/// The representation decides how the body travels on the wire: binary
/// bodies are base64-encoded inside a batch, text bodies are embedded as
/// JSON strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Raw bytes.
    Binary(Vec<u8>),
    /// UTF-8 text.
    Text(String),
}

impl MessageBody {
    /// Returns the body as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MessageBody::Binary(bytes) => bytes,
            MessageBody::Text(text) => text.as_bytes(),
        }
    }

    /// Returns the body length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for text bodies.
    pub fn is_text(&self) -> bool {
        matches!(self, MessageBody::Text(_))
    }
}

/// Application properties of a message.
///
/// Keys are unique and keep their insertion order, which is the order
/// they are written to headers and batch entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a property, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Gets the value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes a property, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// A device-to-cloud or cloud-to-device message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: MessageBody,
    properties: Properties,
    message_id: Option<String>,
    correlation_id: Option<String>,
    content_type: Option<String>,
    content_encoding: Option<String>,
}

impl Message {
    /// Creates a message with the given body.
    pub fn new(body: MessageBody) -> Self {
        Self {
            body,
            properties: Properties::new(),
            message_id: None,
            correlation_id: None,
            content_type: None,
            content_encoding: None,
        }
    }

    /// Creates a message with a binary body.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageBody::Binary(bytes.into()))
    }

    /// Creates a message with a text body.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Text(text.into()))
    }

    /// Adds an application property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Sets the message ID.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the correlation ID.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the content type system property.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the content encoding system property.
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Returns the body.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Returns the application properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the application properties for modification.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Returns the message ID.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Returns the correlation ID.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the content type system property.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the content encoding system property.
    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    /// Sets the message ID.
    pub fn set_message_id(&mut self, id: impl Into<String>) {
        self.message_id = Some(id.into());
    }

    /// Sets the correlation ID.
    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.correlation_id = Some(id.into());
    }

    /// Sets the content type system property.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Sets the content encoding system property.
    pub fn set_content_encoding(&mut self, encoding: impl Into<String>) {
        self.content_encoding = Some(encoding.into());
    }

    /// Returns the bytes this message counts against the request ceiling.
    pub fn accounted_size(&self) -> usize {
        accounted_size(self.body.len(), &self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_insertion_order() {
        let mut props = Properties::new();
        props.insert("z", "1");
        props.insert("a", "2");
        props.insert("m", "3");

        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn properties_replace_in_place() {
        let mut props: Properties = [("a", "1"), ("b", "2")].into_iter().collect();
        props.insert("a", "3");

        assert_eq!(props.len(), 2);
        assert_eq!(props.get("a"), Some("3"));
        assert_eq!(props.iter().next(), Some(("a", "3")));
    }

    #[test]
    fn properties_remove() {
        let mut props: Properties = [("a", "1")].into_iter().collect();
        assert_eq!(props.remove("a"), Some("1".to_string()));
        assert_eq!(props.remove("a"), None);
        assert!(props.is_empty());
    }

    #[test]
    fn text_body_length_is_utf8_bytes() {
        let body = MessageBody::Text("héllo".into());
        assert_eq!(body.len(), 6);
        assert!(body.is_text());
    }

    #[test]
    fn message_builder() {
        let msg = Message::from_bytes(vec![1, 2, 3])
            .with_property("temp", "21")
            .with_message_id("m-1")
            .with_correlation_id("c-1")
            .with_content_type("application/json")
            .with_content_encoding("utf-8");

        assert_eq!(msg.body().as_bytes(), &[1, 2, 3]);
        assert_eq!(msg.properties().get("temp"), Some("21"));
        assert_eq!(msg.message_id(), Some("m-1"));
        assert_eq!(msg.correlation_id(), Some("c-1"));
        assert_eq!(msg.content_type(), Some("application/json"));
        assert_eq!(msg.content_encoding(), Some("utf-8"));
    }
}
