//! Shared fixtures for the integration suites: a recording observer, a
//! serializer that always fails, and message helpers.

#![allow(dead_code)]

use std::sync::Arc;

use confirm_relay::transport::InMemoryBroker;
use confirm_relay::{
    Batch, ConfirmPublisher, FailureKind, Message, Observer, Payload, Publisher, PublishingError,
    SerializeError, Serializer,
};
use parking_lot::Mutex;

pub const EXCHANGE: &str = "orders";

/// One observed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Next(Vec<String>),
    Error { kind: FailureKind, ids: Vec<String> },
    Completed,
}

fn ids(batch: &Batch) -> Vec<String> {
    batch.correlation_ids().iter().map(|id| id.to_string()).collect()
}

/// Records every notification in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn next_batches(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Next(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(FailureKind, Vec<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Error { kind, ids } => Some((kind, ids)),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == Event::Completed)
            .count()
    }
}

impl Observer for RecordingObserver {
    fn on_next(&self, batch: &Batch) {
        self.events.lock().push(Event::Next(ids(batch)));
    }

    fn on_error(&self, error: &PublishingError) {
        self.events.lock().push(Event::Error {
            kind: error.kind(),
            ids: ids(error.batch()),
        });
    }

    fn on_completed(&self) {
        self.events.lock().push(Event::Completed);
    }
}

/// A serializer that refuses every payload.
pub struct FailingSerializer;

impl Serializer for FailingSerializer {
    fn name(&self) -> &str {
        "failing"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn serialize(&self, _payload: &Payload) -> Result<Vec<u8>, SerializeError> {
        Err(SerializeError::Custom("serializer exploded".into()))
    }
}

pub fn broker() -> InMemoryBroker {
    InMemoryBroker::new().with_exchange(EXCHANGE)
}

pub fn publisher(broker: &InMemoryBroker) -> Publisher {
    Publisher::builder(ConfirmPublisher::new(broker.clone())).build()
}

pub fn message(publisher: &Publisher, id: &str) -> Arc<Message> {
    Arc::new(
        publisher
            .new_message()
            .routing(EXCHANGE, "placed")
            .correlation_id(id)
            .payload(serde_json::json!({ "order": id }))
            .build()
            .unwrap(),
    )
}

pub fn failing_message(id: &str) -> Arc<Message> {
    Arc::new(
        Message::builder()
            .routing(EXCHANGE, "placed")
            .correlation_id(id)
            .serializer(FailingSerializer)
            .build()
            .unwrap(),
    )
}
