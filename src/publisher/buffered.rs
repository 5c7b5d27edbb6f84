//! Buffered publishing.
//!
//! Messages are collected in memory and handed to the wrapped [`Publisher`] as
//! one batch when the buffer fills up, when it has been idle for the
//! configured TTL, on an explicit [`flush`](BufferedPublisher::flush), or on
//! dispose.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::facade::Publisher;
use super::observer::{Observer, Subscription};
use crate::config::BufferConfig;
use crate::error::PublishError;
use crate::message::{Batch, CancellationToken, Message};

const MIN_TICK: Duration = Duration::from_millis(1);

struct Buffer {
    messages: Vec<Arc<Message>>,
    last_added: Instant,
    /// Set by dispose. Nothing is accepted after the final take.
    closed: bool,
}

struct Shared {
    publisher: Publisher,
    buffer: Mutex<Buffer>,
    capacity: usize,
    idle_ttl: Duration,
}

impl Shared {
    fn push(
        &self,
        messages: impl IntoIterator<Item = Arc<Message>>,
    ) -> Result<Option<Vec<Arc<Message>>>, PublishError> {
        let mut buffer = self.buffer.lock();
        if buffer.closed {
            return Err(PublishError::Disposed);
        }
        buffer.messages.extend(messages);
        buffer.last_added = Instant::now();
        if buffer.messages.len() >= self.capacity {
            Ok(Some(mem::take(&mut buffer.messages)))
        } else {
            Ok(None)
        }
    }

    fn take_if_idle(&self) -> Option<Vec<Arc<Message>>> {
        let mut buffer = self.buffer.lock();
        if buffer.messages.is_empty() || buffer.last_added.elapsed() < self.idle_ttl {
            return None;
        }
        Some(mem::take(&mut buffer.messages))
    }

    fn take(&self) -> Vec<Arc<Message>> {
        mem::take(&mut self.buffer.lock().messages)
    }

    fn close(&self) -> Vec<Arc<Message>> {
        let mut buffer = self.buffer.lock();
        buffer.closed = true;
        mem::take(&mut buffer.messages)
    }

    fn send(&self, messages: Vec<Arc<Message>>, reason: &str) -> Result<(), PublishError> {
        if messages.is_empty() {
            return Ok(());
        }
        debug!(messages = messages.len(), reason, "flushing buffer");
        self.publisher
            .publish_batch(self.publisher.new_batch(messages), &CancellationToken::none())
    }
}

/// A [`Publisher`] front that batches messages in memory.
///
/// Publishing only appends to the buffer. Delivery outcomes reach the wrapped
/// publisher's observers when the buffer is flushed.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use confirm_relay::transport::InMemoryBroker;
/// use confirm_relay::{BufferConfig, BufferedPublisher, ConfirmPublisher, Publisher};
///
/// let broker = InMemoryBroker::new().with_exchange("orders");
/// let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone())).build();
/// let buffered = BufferedPublisher::spawn(publisher, &BufferConfig::new(2, Duration::from_secs(60)));
///
/// for id in 0..2 {
///     let message = buffered
///         .publisher()
///         .new_message()
///         .routing("orders", "placed")
///         .payload(id)
///         .build()
///         .unwrap();
///     buffered.publish(message).unwrap();
/// }
///
/// assert_eq!(broker.delivered().len(), 2);
/// ```
pub struct BufferedPublisher {
    shared: Arc<Shared>,
    stop_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl BufferedPublisher {
    /// Wrap `publisher` and start the idle-flush thread.
    pub fn spawn(publisher: Publisher, config: &BufferConfig) -> Self {
        let shared = Arc::new(Shared {
            publisher,
            buffer: Mutex::new(Buffer {
                messages: Vec::new(),
                last_added: Instant::now(),
                closed: false,
            }),
            capacity: config.capacity.max(1),
            idle_ttl: config.idle_ttl(),
        });
        let tick = (shared.idle_ttl / 2).max(MIN_TICK);
        let (stop_tx, stop_rx) = channel();

        let worker = Arc::clone(&shared);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(tick) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(messages) = worker.take_if_idle() {
                        if let Err(error) = worker.send(messages, "idle") {
                            debug!(error = %error, "idle flush rejected");
                        }
                    }
                }
            }
        });

        Self {
            shared,
            stop_tx,
            handle: Mutex::new(Some(handle)),
            disposed: AtomicBool::new(false),
        }
    }

    /// The wrapped publisher, for building messages and subscribing.
    pub fn publisher(&self) -> &Publisher {
        &self.shared.publisher
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Subscription {
        self.shared.publisher.subscribe(observer)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Messages waiting for the next flush.
    pub fn len(&self) -> usize {
        self.shared.buffer.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn publish(&self, message: impl Into<Arc<Message>>) -> Result<(), PublishError> {
        self.append([message.into()])
    }

    pub fn publish_batch(&self, batch: Batch) -> Result<(), PublishError> {
        self.append(batch.iter().cloned())
    }

    fn append(&self, messages: impl IntoIterator<Item = Arc<Message>>) -> Result<(), PublishError> {
        match self.shared.push(messages)? {
            Some(full) => self.shared.send(full, "capacity"),
            None => Ok(()),
        }
    }

    /// Publish everything buffered so far as one batch.
    pub fn flush(&self) -> Result<(), PublishError> {
        self.shared.send(self.shared.take(), "explicit")
    }

    /// Stop the idle-flush thread, flush what is left and dispose the wrapped
    /// publisher. Only the first call has an effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("idle flush thread panicked");
            }
        }
        if let Err(error) = self.shared.send(self.shared.close(), "dispose") {
            debug!(error = %error, "final flush rejected");
        }
        info!("buffered publisher disposed");
        self.shared.publisher.dispose();
    }
}

impl Drop for BufferedPublisher {
    fn drop(&mut self) {
        self.dispose();
    }
}
