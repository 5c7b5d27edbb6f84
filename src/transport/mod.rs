//! Transport capability - the broker-facing side of the pipeline.
//!
//! The pipeline does not speak any wire protocol itself. It drives a
//! transport through three small traits:
//!
//! ```text
//! ┌───────────────────┐  connect()   ┌──────────────┐  create_session()  ┌─────────────┐
//! │ ConnectionFactory │ ───────────▶ │  Connection  │ ─────────────────▶ │   Session   │
//! │  (config / URI)   │              │ (shared, one │                    │ (per publish│
//! └───────────────────┘              │  per process)│                    │  call)      │
//!                                    └──────────────┘                    └─────────────┘
//!                                                        confirm_select / verify_exchange /
//!                                                        stage / flush / await_confirms / close
//! ```
//!
//! A connection is shared by every publish call and must tolerate concurrent
//! `create_session` calls. A session is owned by exactly one call and is never
//! used concurrently.
//!
//! [`InMemoryBroker`] implements all three for tests and single-process use.

mod error;
mod exchange_cache;
mod in_memory;

use std::sync::Arc;
use std::time::Duration;

use crate::message::Headers;

pub use error::{TransportError, TransportErrorKind, ACCESS_REFUSED, NOT_FOUND};
pub use exchange_cache::ExchangeCache;
pub use in_memory::{BrokerStats, ConfirmMode, InMemoryBroker};

/// A fully encoded message ready to be staged on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub correlation_id: String,
    pub content_type: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Opens connections to a broker.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn Connection>, TransportError>;
}

impl<F: ConnectionFactory + ?Sized> ConnectionFactory for Arc<F> {
    fn connect(&self) -> Result<Arc<dyn Connection>, TransportError> {
        (**self).connect()
    }
}

/// A live broker connection, shared across publish calls.
pub trait Connection: Send + Sync {
    fn create_session(&self) -> Result<Box<dyn Session>, TransportError>;

    fn close(&self);
}

/// A single-writer channel used by one publish call.
pub trait Session: Send {
    /// Enable publisher confirms on this session.
    fn confirm_select(&mut self) -> Result<(), TransportError>;

    /// Check that `exchange` exists without declaring it.
    fn verify_exchange(&mut self, exchange: &str) -> Result<(), TransportError>;

    /// Add a message to the pending send. `Ok(false)` means the session
    /// declined it.
    fn stage(&mut self, message: OutboundMessage) -> Result<bool, TransportError>;

    /// Send everything staged so far as one network operation.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the broker to acknowledge every flushed send.
    fn await_confirms(&mut self, timeout: Duration) -> Result<bool, TransportError>;

    fn close(&mut self);
}
