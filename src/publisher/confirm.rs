use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::behavior::{Behavior, Next};
use crate::error::{PipelineError, PublishingError};
use crate::message::{headers, Batch, CancellationToken, Message};
use crate::serializer::SerializeError;
use crate::transport::{
    Connection, ConnectionFactory, ExchangeCache, OutboundMessage, Session, TransportError,
    TransportErrorKind,
};

/// Why a single message could not be staged.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("exchange check failed: {0}")]
    Routing(#[source] TransportError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error("staging failed: {0}")]
    Transport(#[source] TransportError),
    #[error("session declined the message")]
    Declined,
}

/// Closes the session on every exit path.
struct SessionGuard {
    session: Box<dyn Session>,
}

impl SessionGuard {
    fn open(connection: &dyn Connection) -> Result<Self, TransportError> {
        let session = connection.create_session()?;
        debug!("session opened");
        Ok(Self { session })
    }
}

impl Deref for SessionGuard {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        debug!("session closed");
    }
}

/// Terminal behavior: stages every message of the batch on a fresh session,
/// flushes once and waits for broker confirms.
///
/// Outcomes for a batch:
///
/// | staged | failed staging | confirms    | result                            |
/// |--------|----------------|-------------|-----------------------------------|
/// | none   | all            | -           | `TotalFailure` over the batch     |
/// | none   | some           | -           | `PartialFailure` over the failed  |
/// | none   | none           | -           | `Ok` (everything was cancelled)   |
/// | some   | none           | ack         | `Ok`                              |
/// | some   | some           | ack         | `PartialFailure` over the failed  |
/// | some   | any            | none / nack | `NotConfirmed` over the attempted |
///
/// The broker connection is opened on first use and shared by every later
/// call; sessions are never shared.
pub struct ConfirmPublisher<F> {
    factory: F,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    connect_lock: Mutex<()>,
    exchanges: Arc<ExchangeCache>,
    disposed: AtomicBool,
}

impl<F: ConnectionFactory> ConfirmPublisher<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            connection: RwLock::new(None),
            connect_lock: Mutex::new(()),
            exchanges: Arc::new(ExchangeCache::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Share a verified-exchange cache with other publishers.
    pub fn with_exchange_cache(mut self, exchanges: Arc<ExchangeCache>) -> Self {
        self.exchanges = exchanges;
        self
    }

    pub fn exchange_cache(&self) -> &Arc<ExchangeCache> {
        &self.exchanges
    }

    pub fn is_connected(&self) -> bool {
        self.connection.read().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn connection(&self) -> Result<Arc<dyn Connection>, PipelineError> {
        if let Some(connection) = self.connection.read().as_ref() {
            return Ok(Arc::clone(connection));
        }

        let _guard = self.connect_lock.lock();
        if self.is_disposed() {
            return Err(PipelineError::Disposed);
        }
        if let Some(connection) = self.connection.read().as_ref() {
            return Ok(Arc::clone(connection));
        }

        debug!("opening broker connection");
        let connection = self.factory.connect()?;
        *self.connection.write() = Some(Arc::clone(&connection));
        Ok(connection)
    }

    fn open_session(&self) -> Result<SessionGuard, PipelineError> {
        let connection = self.connection()?;
        match SessionGuard::open(connection.as_ref()) {
            Ok(session) => Ok(session),
            Err(error) => {
                if error.kind() == TransportErrorKind::Connection {
                    self.forget_connection(&connection);
                }
                Err(error.into())
            }
        }
    }

    /// Drop a dead connection so the next call reconnects.
    fn forget_connection(&self, dead: &Arc<dyn Connection>) {
        let _guard = self.connect_lock.lock();
        let mut current = self.connection.write();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, dead)) {
            warn!("broker connection lost, reconnecting on next publish");
            if let Some(connection) = current.take() {
                connection.close();
            }
        }
    }

    fn stage(&self, session: &mut dyn Session, message: &Message) -> Result<(), StageError> {
        let routing = message.routing();
        self.exchanges
            .verify(session, routing.exchange_name())
            .map_err(StageError::Routing)?;

        let body = message.serialize()?;
        let outbound = OutboundMessage {
            exchange: routing.exchange_name().to_string(),
            routing_key: routing.routing_key().to_string(),
            correlation_id: message.correlation_id().to_string(),
            content_type: message.content_type().to_string(),
            headers: message.headers(),
            body,
        };

        if session.stage(outbound).map_err(StageError::Transport)? {
            Ok(())
        } else {
            Err(StageError::Declined)
        }
    }
}

impl<F: ConnectionFactory> Behavior for ConfirmPublisher<F> {
    fn name(&self) -> &str {
        "confirm-publisher"
    }

    fn execute(
        &self,
        batch: Batch,
        _next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if self.is_disposed() {
            return Err(PipelineError::Disposed);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut session = self.open_session()?;
        session.confirm_select()?;

        let mut staged = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        for message in &batch {
            if message.is_cancelled() {
                debug!(correlation_id = message.correlation_id(), "message cancelled, skipping");
                skipped.push(Arc::clone(message));
                continue;
            }
            match self.stage(&mut *session, message) {
                Ok(()) => staged.push(Arc::clone(message)),
                Err(error) => {
                    warn!(
                        correlation_id = message.correlation_id(),
                        routing = %message.routing(),
                        error = %error,
                        "message could not be staged"
                    );
                    message.add_header(headers::LAST_EXCEPTION, error.to_string());
                    failed.push(Arc::clone(message));
                }
            }
        }

        if failed.len() == batch.len() {
            return Err(PublishingError::total_failure(batch).into());
        }

        if cancel.is_cancelled() || staged.is_empty() {
            debug!(staged = staged.len(), "nothing to flush");
            if failed.is_empty() {
                return Ok(());
            }
            return Err(PublishingError::partial_failure(batch.only(failed)).into());
        }

        session.flush()?;
        debug!(staged = staged.len(), "flushed, awaiting confirms");

        if !session.await_confirms(batch.publishing_timeout())? {
            warn!(
                staged = staged.len(),
                timeout_ms = batch.publishing_timeout().as_millis() as u64,
                "broker did not confirm the batch"
            );
            let attempted = batch.except(&batch.only(skipped));
            return Err(PublishingError::not_confirmed(attempted).into());
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PublishingError::partial_failure(batch.only(failed)).into())
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = self.connect_lock.lock();
        if let Some(connection) = self.connection.write().take() {
            connection.close();
            info!("broker connection closed");
        }
    }
}
