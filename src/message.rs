//! Message envelope and header types.

use std::fmt;

/// Possible payload and header values.
///
/// Messages are dynamically typed: the payload a source produces may be an
/// integer while the aggregator downstream emits a joined string. `Display`
/// is used wherever a value needs a textual rendition (logging, payload
/// joining).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// A single header entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: Value,
}

/// String-keyed metadata attached to a message.
///
/// Keys are unique: inserting an existing key replaces its value.
/// Iteration order is insertion order, but nothing downstream depends on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|h| h.key == key) {
            Some(existing) => existing.value = value,
            None => self.entries.push(Header { key, value }),
        }
    }

    /// Look up a header value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|h| h.key == key).map(|h| &h.value)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|h| (h.key.as_str(), &h.value))
    }
}

/// Immutable envelope carrying a payload and headers through a pipeline.
///
/// A new `Message` is produced at each transformation; nothing mutates a
/// message in place once it has entered the flow.
///
/// # Example
///
/// ```rust
/// use conflux::message::{Message, Value};
///
/// let msg = Message::new(42i64).with_header("origin", "ticker");
/// assert_eq!(msg.payload(), &Value::Int(42));
/// assert!(msg.headers().contains("origin"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Value,
    headers: Headers,
}

impl Message {
    /// Create a message with an empty header set.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    /// Create a message with the given headers.
    pub fn with_headers(payload: impl Into<Value>, headers: Headers) -> Self {
        Self {
            payload: payload.into(),
            headers,
        }
    }

    /// Attach a header, consuming and returning the message.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// The message payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The message headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Consume the message, returning its payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Produce a new message with a transformed payload, carrying the
    /// headers over unchanged.
    pub fn map_payload(self, f: impl FnOnce(Value) -> Value) -> Message {
        Message {
            payload: f(self.payload),
            headers: self.headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_insert_and_get() {
        let mut headers = Headers::new();
        headers.insert("a", 1i64);
        headers.insert("b", "two");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("a"), Some(&Value::Int(1)));
        assert_eq!(headers.get("b"), Some(&Value::Str("two".into())));
        assert!(headers.get("c").is_none());
    }

    #[test]
    fn test_headers_duplicate_key_replaces() {
        let mut headers = Headers::new();
        headers.insert("key", 1i64);
        headers.insert("key", 2i64);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("key"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_message_with_header() {
        let msg = Message::new("payload")
            .with_header("x", 1i64)
            .with_header("y", true);

        assert_eq!(msg.headers().len(), 2);
        assert_eq!(msg.headers().get("y"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_map_payload_keeps_headers() {
        let msg = Message::new(21i64).with_header("keep", "me");
        let doubled = msg.map_payload(|v| match v {
            Value::Int(i) => Value::Int(i * 2),
            other => other,
        });

        assert_eq!(doubled.payload(), &Value::Int(42));
        assert!(doubled.headers().contains("keep"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Bytes(vec![0, 1, 2]).to_string(), "<3 bytes>");
    }
}
