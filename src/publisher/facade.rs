use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::confirm::ConfirmPublisher;
use super::observer::{Observer, ObserverSet, Subscription};
use crate::behavior::{Behavior, BehaviorChain, Next};
use crate::config::{ConfigError, PublisherConfig};
use crate::error::{FailureKind, PipelineError, PublishError, PublishingError};
use crate::message::{Batch, CancellationToken, Message, MessageBuilder, DEFAULT_PUBLISHING_TIMEOUT};
use crate::retry::{Backoff, RetryBehavior};
use crate::serializer::{JsonSerializer, Serializer};
use crate::transport::ConnectionFactory;

/// What the facade does when the broker does not confirm a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotConfirmedPolicy {
    /// Notify observers only.
    #[default]
    Report,
    /// Notify observers and return [`PublishError::NotConfirmed`].
    Raise,
}

/// Entry point for publishing.
///
/// Runs every batch through a [`BehaviorChain`] built once at construction
/// and turns the outcome into observer events:
///
/// - success: `on_next(batch)`
/// - failure: `on_error(failed)`, then `on_next(batch - failed)` if anything
///   made it
///
/// Failures are not returned to the caller. Subscribe an [`Observer`] to see
/// them.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use confirm_relay::transport::InMemoryBroker;
/// use confirm_relay::{
///     ArithmeticBackoff, CallbackObserver, CancellationToken, ConfirmPublisher, Publisher,
/// };
///
/// let broker = InMemoryBroker::new().with_exchange("orders");
/// let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
///     .retry(ArithmeticBackoff::new(100, Duration::from_millis(50)).with_max_attempts(3))
///     .build();
///
/// let _subscription = publisher.subscribe(Arc::new(
///     CallbackObserver::new().with_error(|error| eprintln!("{}", error)),
/// ));
///
/// let message = publisher
///     .new_message()
///     .routing("orders", "placed")
///     .payload(serde_json::json!({ "id": 1 }))
///     .build()
///     .unwrap();
/// publisher.publish(message, &CancellationToken::none()).unwrap();
///
/// assert_eq!(broker.delivered().len(), 1);
/// ```
pub struct Publisher {
    chain: BehaviorChain,
    observers: Arc<ObserverSet>,
    serializer: Arc<dyn Serializer>,
    publishing_timeout: Duration,
    not_confirmed: NotConfirmedPolicy,
    disposed: AtomicBool,
}

impl Publisher {
    pub fn builder(terminal: impl Behavior + 'static) -> PublisherBuilder {
        PublisherBuilder::new(Box::new(terminal))
    }

    /// Publisher with a [`ConfirmPublisher`] terminal over `factory`,
    /// configured from `config`.
    pub fn from_config<F>(config: &PublisherConfig, factory: F) -> Result<Self, ConfigError>
    where
        F: ConnectionFactory + 'static,
    {
        let settings = config.connection_settings()?;
        debug!(
            host = %settings.host,
            port = settings.port,
            vhost = %settings.virtual_host,
            "publisher configured"
        );
        let mut builder = Publisher::builder(ConfirmPublisher::new(factory))
            .publishing_timeout(config.publishing_timeout())
            .not_confirmed(config.not_confirmed);
        if let Some(retry) = &config.retry {
            builder = builder.retry(retry.backoff()?);
        }
        Ok(builder.build())
    }

    /// Start a message that uses this publisher's default serializer.
    pub fn new_message(&self) -> MessageBuilder {
        Message::builder().shared_serializer(Arc::clone(&self.serializer))
    }

    /// A batch that uses this publisher's publishing timeout.
    pub fn new_batch<I>(&self, messages: I) -> Batch
    where
        I: IntoIterator<Item = Arc<Message>>,
    {
        Batch::new(messages).with_timeout(self.publishing_timeout)
    }

    pub fn publish(
        &self,
        message: impl Into<Arc<Message>>,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        self.publish_batch(self.new_batch([message.into()]), cancel)
    }

    pub fn publish_batch(&self, batch: Batch, cancel: &CancellationToken) -> Result<(), PublishError> {
        if self.is_disposed() {
            return Err(PublishError::Disposed);
        }
        if batch.is_empty() {
            return Ok(());
        }

        debug!(messages = batch.len(), "publishing batch");
        for message in &batch {
            message.mark_published();
        }

        let error = match self.chain.execute(batch.clone(), Next::end(), cancel) {
            Ok(()) => {
                self.observers.next(&batch);
                return Ok(());
            }
            Err(PipelineError::Disposed) => return Err(PublishError::Disposed),
            Err(error) => PublishingError::from_pipeline(batch.clone(), error),
        };

        warn!(
            kind = ?error.kind(),
            failed = error.batch().len(),
            of = batch.len(),
            error = %error,
            "batch was not fully published"
        );
        self.observers.error(&error);
        let remainder = batch.except(error.batch());
        if !remainder.is_empty() {
            self.observers.next(&remainder);
        }

        if error.kind() == FailureKind::NotConfirmed && self.not_confirmed == NotConfirmedPolicy::Raise {
            return Err(PublishError::NotConfirmed(error));
        }
        Ok(())
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Subscription {
        self.observers.subscribe(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Step names, outermost first.
    pub fn behaviors(&self) -> Vec<&str> {
        self.chain.names()
    }

    pub fn publishing_timeout(&self) -> Duration {
        self.publishing_timeout
    }

    pub fn not_confirmed_policy(&self) -> NotConfirmedPolicy {
        self.not_confirmed
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Dispose the chain and send `on_completed` to every observer. Only the
    /// first call has an effect. A publish still running on another thread
    /// sends no events once this returns.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(behaviors = ?self.chain.names(), "disposing publisher");
        self.chain.dispose();
        self.observers.completed();
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Fluent construction of a [`Publisher`].
pub struct PublisherBuilder {
    terminal: Box<dyn Behavior>,
    retry: Option<Box<dyn Behavior>>,
    behaviors: Vec<Box<dyn Behavior>>,
    serializer: Arc<dyn Serializer>,
    publishing_timeout: Duration,
    not_confirmed: NotConfirmedPolicy,
}

impl PublisherBuilder {
    fn new(terminal: Box<dyn Behavior>) -> Self {
        Self {
            terminal,
            retry: None,
            behaviors: Vec::new(),
            serializer: Arc::new(JsonSerializer),
            publishing_timeout: DEFAULT_PUBLISHING_TIMEOUT,
            not_confirmed: NotConfirmedPolicy::default(),
        }
    }

    /// Retry failed messages under `backoff`. The retry step is always the
    /// outermost behavior.
    pub fn retry(mut self, backoff: impl Backoff + 'static) -> Self {
        self.retry = Some(Box::new(RetryBehavior::new(backoff)));
        self
    }

    /// Add a behavior between the retry step and the terminal. Behaviors run
    /// in the order they are added.
    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behaviors.push(Box::new(behavior));
        self
    }

    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    pub fn publishing_timeout(mut self, timeout: Duration) -> Self {
        self.publishing_timeout = timeout;
        self
    }

    pub fn not_confirmed(mut self, policy: NotConfirmedPolicy) -> Self {
        self.not_confirmed = policy;
        self
    }

    pub fn build(self) -> Publisher {
        let behaviors = self.retry.into_iter().chain(self.behaviors);
        Publisher {
            chain: BehaviorChain::create(self.terminal, behaviors),
            observers: Arc::new(ObserverSet::default()),
            serializer: self.serializer,
            publishing_timeout: self.publishing_timeout,
            not_confirmed: self.not_confirmed,
            disposed: AtomicBool::new(false),
        }
    }
}
