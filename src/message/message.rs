use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::cancellation::CancellationToken;
use super::headers::{self, HeaderValue, Headers};
use super::routing::Routing;
use crate::serializer::{Payload, SerializeError, Serializer};

/// Error returned by [`MessageBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("message routing is required")]
    MissingRouting,
    #[error("message serializer is required")]
    MissingSerializer,
}

/// One logical unit to publish.
///
/// Everything except the headers is fixed at construction. Headers sit behind
/// a lock so the transport step can record diagnostics on a message that is
/// shared between a batch and the batches derived from it.
pub struct Message {
    created_at: DateTime<Utc>,
    correlation_id: String,
    routing: Routing,
    cancellation: CancellationToken,
    headers: Mutex<Headers>,
    payload: Payload,
    serializer: Arc<dyn Serializer>,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    fn new(
        routing: Routing,
        serializer: Arc<dyn Serializer>,
        payload: Payload,
        correlation_id: Option<String>,
        cancellation: CancellationToken,
    ) -> Self {
        let created_at = Utc::now();

        let mut seeded = Headers::new();
        seeded.set(headers::EXCHANGE_NAME, routing.exchange_name());
        seeded.set(headers::ROUTING_KEY, routing.routing_key());
        seeded.set(headers::SERIALIZER_TYPE, serializer.name());
        seeded.set(
            headers::CREATED_AT,
            created_at.format(headers::TIMESTAMP_FORMAT).to_string(),
        );

        Self {
            created_at,
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            routing,
            cancellation,
            headers: Mutex::new(seeded),
            payload,
            serializer,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Snapshot of the current headers.
    pub fn headers(&self) -> Headers {
        self.headers.lock().clone()
    }

    pub fn header(&self, key: &str) -> Option<HeaderValue> {
        self.headers.lock().get(key).cloned()
    }

    /// Set a header, overwriting any previous value for `key`.
    pub fn add_header(&self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.headers.lock().set(key, value);
    }

    pub(crate) fn mark_published(&self) {
        self.add_header(
            headers::PUBLISHED_AT,
            Utc::now().format(headers::TIMESTAMP_FORMAT).to_string(),
        );
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        self.serializer.serialize(&self.payload)
    }

    pub fn content_type(&self) -> &str {
        self.serializer.content_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("correlation_id", &self.correlation_id)
            .field("routing", &self.routing)
            .field("created_at", &self.created_at)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Fluent construction of a [`Message`].
///
/// ```
/// use confirm_relay::{JsonSerializer, Message};
///
/// let message = Message::builder()
///     .routing("orders", "order.placed")
///     .correlation_id("order-42")
///     .serializer(JsonSerializer)
///     .payload(serde_json::json!({ "id": 42 }))
///     .build()
///     .unwrap();
///
/// assert_eq!(message.correlation_id(), "order-42");
/// assert_eq!(message.serialize().unwrap(), br#"{"id":42}"#);
/// ```
#[derive(Default)]
pub struct MessageBuilder {
    routing: Option<Routing>,
    correlation_id: Option<String>,
    cancellation: Option<CancellationToken>,
    serializer: Option<Arc<dyn Serializer>>,
    payload: Option<Payload>,
    headers: Vec<(String, HeaderValue)>,
}

impl MessageBuilder {
    pub fn routing(mut self, exchange_name: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.routing = Some(Routing::new(exchange_name, routing_key));
        self
    }

    pub fn with_routing(mut self, routing: Routing) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Defaults to a random UUID when not set.
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn serializer<S: Serializer + 'static>(mut self, serializer: S) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn shared_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn payload<T>(mut self, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.payload = Some(Payload::new(value));
        self
    }

    pub fn body(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Extra header applied after the seeded ones.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Message, BuildError> {
        let routing = self.routing.ok_or(BuildError::MissingRouting)?;
        let serializer = self.serializer.ok_or(BuildError::MissingSerializer)?;
        let message = Message::new(
            routing,
            serializer,
            self.payload.unwrap_or_else(|| Payload::new(())),
            self.correlation_id,
            self.cancellation.unwrap_or_default(),
        );
        for (key, value) in self.headers {
            message.add_header(key, value);
        }
        Ok(message)
    }
}
