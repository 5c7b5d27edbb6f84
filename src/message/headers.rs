//! Message headers.
//!
//! Headers keep insertion order (brokers and humans both read them top to
//! bottom) and have set semantics: writing an existing key replaces its value
//! in place.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const EXCHANGE_NAME: &str = "ExchangeName";
pub const ROUTING_KEY: &str = "RoutingKey";
pub const SERIALIZER_TYPE: &str = "SerializerType";
pub const CREATED_AT: &str = "CreatedAt";
pub const PUBLISHED_AT: &str = "PublishedAt";
/// Written by the transport step when a message could not be staged.
pub const LAST_EXCEPTION: &str = "LastException";

/// Timestamp format used for `CreatedAt` / `PublishedAt`.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => f.write_str(s),
            HeaderValue::Int(i) => write!(f, "{}", i),
            HeaderValue::Bool(b) => write!(f, "{}", b),
            HeaderValue::Bytes(bytes) => f.write_str(&STANDARD.encode(bytes)),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        HeaderValue::Bytes(value)
    }
}

/// Insertion-ordered header map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }
}
