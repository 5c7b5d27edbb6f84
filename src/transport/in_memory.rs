//! In-memory broker for testing and single-process scenarios.
//!
//! This module provides a thread-safe broker that implements
//! `ConnectionFactory`, `Connection` and `Session`, useful for:
//! - Unit and integration testing without a running broker
//! - Exercising confirm timeouts and staging failures deterministically
//! - Development and prototyping

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{Connection, ConnectionFactory, OutboundMessage, Session, TransportError, NOT_FOUND};

/// How the broker answers `await_confirms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Acknowledge immediately.
    #[default]
    Ack,
    /// Negatively acknowledge immediately; nothing is delivered.
    Nack,
    /// Never acknowledge; the wait runs for the full timeout.
    Timeout,
    /// Acknowledge after the given delay, if the caller waits that long.
    AckAfter(Duration),
}

/// Counters describing what the broker has seen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BrokerStats {
    pub connections_opened: usize,
    pub connections_closed: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub exchange_checks: usize,
    pub messages_staged: usize,
    pub flushes: usize,
    pub confirm_waits: usize,
}

#[derive(Default)]
struct BrokerState {
    exchanges: RwLock<HashSet<String>>,
    delivered: Mutex<Vec<OutboundMessage>>,
    confirm_mode: Mutex<ConfirmMode>,
    /// correlation id -> remaining staging rejections
    rejections: Mutex<HashMap<String, usize>>,
    flush_failure: Mutex<Option<TransportError>>,
    refuse_connections: AtomicBool,
    stats: Mutex<BrokerStats>,
}

/// In-memory broker.
///
/// Features:
/// - Thread-safe (clones share the same broker)
/// - Exchanges must be declared up front; unknown ones fail verification with 404
/// - Delivered messages are kept in an append-only log
/// - Confirm behavior and staging failures can be scripted per test
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use confirm_relay::transport::{ConnectionFactory, InMemoryBroker, OutboundMessage};
/// use confirm_relay::Headers;
///
/// let broker = InMemoryBroker::new().with_exchange("orders");
/// let connection = broker.connect().unwrap();
/// let mut session = connection.create_session().unwrap();
///
/// session.confirm_select().unwrap();
/// session.verify_exchange("orders").unwrap();
/// session.stage(OutboundMessage {
///     exchange: "orders".into(),
///     routing_key: "placed".into(),
///     correlation_id: "o-1".into(),
///     content_type: "application/json".into(),
///     headers: Headers::new(),
///     body: b"{}".to_vec(),
/// }).unwrap();
/// session.flush().unwrap();
/// assert!(session.await_confirms(Duration::from_millis(100)).unwrap());
/// session.close();
///
/// assert_eq!(broker.delivered().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an exchange (builder form).
    pub fn with_exchange(self, name: impl Into<String>) -> Self {
        self.declare_exchange(name);
        self
    }

    pub fn declare_exchange(&self, name: impl Into<String>) {
        self.state.exchanges.write().insert(name.into());
    }

    pub fn set_confirm_mode(&self, mode: ConfirmMode) {
        *self.state.confirm_mode.lock() = mode;
    }

    /// Fail the next `times` attempts to stage the message with this
    /// correlation id.
    pub fn reject(&self, correlation_id: impl Into<String>, times: usize) {
        self.state
            .rejections
            .lock()
            .insert(correlation_id.into(), times);
    }

    /// Make the next `flush` fail with `error`.
    pub fn fail_next_flush(&self, error: TransportError) {
        *self.state.flush_failure.lock() = Some(error);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Every message acknowledged by the broker, in delivery order.
    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.state.delivered.lock().clone()
    }

    pub fn delivered_correlation_ids(&self) -> Vec<String> {
        self.state
            .delivered
            .lock()
            .iter()
            .map(|m| m.correlation_id.clone())
            .collect()
    }

    pub fn stats(&self) -> BrokerStats {
        self.state.stats.lock().clone()
    }
}

impl ConnectionFactory for InMemoryBroker {
    fn connect(&self) -> Result<Arc<dyn Connection>, TransportError> {
        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "in-memory broker is refusing connections".into(),
            ));
        }
        self.state.stats.lock().connections_opened += 1;
        Ok(Arc::new(InMemoryConnection {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryConnection {
    state: Arc<BrokerState>,
    closed: AtomicBool,
}

impl Connection for InMemoryConnection {
    fn create_session(&self) -> Result<Box<dyn Session>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed("connection is closed".into()));
        }
        self.state.stats.lock().sessions_opened += 1;
        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
            confirms: false,
            staged: Vec::new(),
            in_flight: Vec::new(),
            closed: false,
        }))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.stats.lock().connections_closed += 1;
        }
    }
}

struct InMemorySession {
    state: Arc<BrokerState>,
    confirms: bool,
    staged: Vec<OutboundMessage>,
    in_flight: Vec<OutboundMessage>,
    closed: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::SessionClosed("session is closed".into()));
        }
        Ok(())
    }

    fn take_rejection(&self, correlation_id: &str) -> bool {
        let mut rejections = self.state.rejections.lock();
        match rejections.get_mut(correlation_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn deliver(&mut self) {
        self.state.delivered.lock().append(&mut self.in_flight);
    }
}

impl Session for InMemorySession {
    fn confirm_select(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.confirms = true;
        Ok(())
    }

    fn verify_exchange(&mut self, exchange: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.state.stats.lock().exchange_checks += 1;
        if self.state.exchanges.read().contains(exchange) {
            Ok(())
        } else {
            Err(TransportError::from_reply_code(
                NOT_FOUND,
                format!("NOT_FOUND - no exchange '{}'", exchange),
            ))
        }
    }

    fn stage(&mut self, message: OutboundMessage) -> Result<bool, TransportError> {
        self.ensure_open()?;
        if self.take_rejection(&message.correlation_id) {
            return Err(TransportError::Other(format!(
                "message {} rejected by broker",
                message.correlation_id
            )));
        }
        self.state.stats.lock().messages_staged += 1;
        self.staged.push(message);
        Ok(true)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        if let Some(error) = self.state.flush_failure.lock().take() {
            return Err(error);
        }
        self.state.stats.lock().flushes += 1;
        self.in_flight.append(&mut self.staged);
        Ok(())
    }

    fn await_confirms(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.ensure_open()?;
        if !self.confirms {
            return Err(TransportError::Other("session is not in confirm mode".into()));
        }
        self.state.stats.lock().confirm_waits += 1;

        let mode = *self.state.confirm_mode.lock();
        match mode {
            ConfirmMode::Ack => {
                self.deliver();
                Ok(true)
            }
            ConfirmMode::Nack => {
                self.in_flight.clear();
                Ok(false)
            }
            ConfirmMode::Timeout => {
                thread::sleep(timeout);
                Ok(false)
            }
            ConfirmMode::AckAfter(delay) if delay <= timeout => {
                thread::sleep(delay);
                self.deliver();
                Ok(true)
            }
            ConfirmMode::AckAfter(_) => {
                thread::sleep(timeout);
                Ok(false)
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.stats.lock().sessions_closed += 1;
        }
    }
}
