//! Payload serialization.
//!
//! A [`Payload`] is opaque to the pipeline: the only way to turn it into bytes
//! is through the [`Serializer`] attached to its message.
//!
//! ```
//! use confirm_relay::{JsonSerializer, Payload, Serializer};
//!
//! #[derive(serde::Serialize)]
//! struct OrderPlaced { id: u32 }
//!
//! let payload = Payload::new(OrderPlaced { id: 7 });
//! let bytes = JsonSerializer.serialize(&payload).unwrap();
//! assert_eq!(bytes, br#"{"id":7}"#);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bitcode encoding failed: {0}")]
    Bitcode(#[from] bitcode::Error),
    #[error("{serializer} cannot encode a {payload} payload")]
    Unsupported {
        serializer: String,
        payload: &'static str,
    },
    #[error("{0}")]
    Custom(String),
}

trait Encode: Send + Sync {
    fn json(&self) -> Result<Vec<u8>, SerializeError>;
    fn bitcode(&self) -> Result<Vec<u8>, SerializeError>;
    fn type_name(&self) -> &'static str;
}

struct Typed<T>(T);

impl<T: Serialize + Send + Sync> Encode for Typed<T> {
    fn json(&self) -> Result<Vec<u8>, SerializeError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    fn bitcode(&self) -> Result<Vec<u8>, SerializeError> {
        Ok(bitcode::serialize(&self.0)?)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Clone)]
enum Body {
    Typed(Arc<dyn Encode>),
    Bytes(Arc<[u8]>),
}

/// Type-erased message body.
#[derive(Clone)]
pub struct Payload {
    body: Body,
}

impl Payload {
    /// Wrap any serde-serializable value.
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self {
            body: Body::Typed(Arc::new(Typed(value))),
        }
    }

    /// Wrap bytes that are already encoded.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Body::Bytes(Arc::from(bytes.into())),
        }
    }

    /// Rust type name of the wrapped value (`"bytes"` for raw payloads).
    pub fn type_name(&self) -> &'static str {
        match &self.body {
            Body::Typed(value) => value.type_name(),
            Body::Bytes(_) => "bytes",
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SerializeError> {
        match &self.body {
            Body::Typed(value) => value.json(),
            Body::Bytes(_) => Err(SerializeError::Unsupported {
                serializer: "json".into(),
                payload: "bytes",
            }),
        }
    }

    pub fn to_bitcode(&self) -> Result<Vec<u8>, SerializeError> {
        match &self.body {
            Body::Typed(value) => value.bitcode(),
            Body::Bytes(_) => Err(SerializeError::Unsupported {
                serializer: "bitcode".into(),
                payload: "bytes",
            }),
        }
    }

    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Typed(_) => None,
            Body::Bytes(bytes) => Some(&bytes[..]),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.type_name())
            .finish()
    }
}

/// Turns a [`Payload`] into the bytes put on the wire.
pub trait Serializer: Send + Sync {
    /// Identity recorded in the `SerializerType` header.
    fn name(&self) -> &str;

    fn content_type(&self) -> &str;

    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>, SerializeError>;
}

/// `application/json` via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>, SerializeError> {
        payload.to_json()
    }
}

/// Compact binary encoding via bitcode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcodeSerializer;

impl Serializer for BitcodeSerializer {
    fn name(&self) -> &str {
        "bitcode"
    }

    fn content_type(&self) -> &str {
        "application/x-bitcode"
    }

    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>, SerializeError> {
        payload.to_bitcode()
    }
}

/// Passes pre-encoded bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSerializer;

impl Serializer for RawSerializer {
    fn name(&self) -> &str {
        "raw"
    }

    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>, SerializeError> {
        payload
            .raw_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SerializeError::Unsupported {
                serializer: self.name().to_string(),
                payload: payload.type_name(),
            })
    }
}
