use parking_lot::Mutex;
use serde_json::json;

use super::observer::Observer;
use crate::error::PublishingError;
use crate::message::Batch;
use crate::EventEmitter;

pub const PUBLISHED_EVENT: &str = "published";
pub const FAILED_EVENT: &str = "failed";
pub const COMPLETED_EVENT: &str = "completed";

/// Forwards publisher events to an [`EventEmitter`] for in-process listeners.
///
/// Each event carries a JSON summary as a `String`:
///
/// - `published`: `{"count": 2, "correlation_ids": ["a", "b"]}`
/// - `failed`: `{"kind": "PartialFailure", "message": "...", "count": 1, "correlation_ids": ["c"]}`
/// - `completed`: `{}`
///
/// Listeners run on the emitter's own threads.
pub struct EmitterObserver {
    emitter: Mutex<EventEmitter>,
}

impl EmitterObserver {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            emitter: Mutex::new(emitter),
        }
    }

    fn emit(&self, event: &str, summary: serde_json::Value) {
        self.emitter.lock().emit(event, summary.to_string());
    }
}

impl Observer for EmitterObserver {
    fn on_next(&self, batch: &Batch) {
        self.emit(
            PUBLISHED_EVENT,
            json!({
                "count": batch.len(),
                "correlation_ids": batch.correlation_ids(),
            }),
        );
    }

    fn on_error(&self, error: &PublishingError) {
        self.emit(
            FAILED_EVENT,
            json!({
                "kind": format!("{:?}", error.kind()),
                "message": error.message(),
                "count": error.batch().len(),
                "correlation_ids": error.batch().correlation_ids(),
            }),
        );
    }

    fn on_completed(&self) {
        self.emit(COMPLETED_EVENT, json!({}));
    }
}
