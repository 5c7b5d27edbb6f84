//! Confirm-gated publish pipeline for message brokers.
//!
//! Messages are grouped into immutable [`Batch`]es and run through a
//! [`BehaviorChain`] whose innermost step, [`ConfirmPublisher`], stages every
//! message on a broker session, flushes once and waits for publisher
//! confirms. Failures are tracked per message: a batch can succeed for some
//! messages and fail for others, and [`RetryBehavior`] retries only the ones
//! that failed. The [`Publisher`] facade reports outcomes to [`Observer`]s.

mod behavior;
mod config;
mod error;
mod message;
mod publisher;
mod retry;
mod serializer;
pub mod transport;

pub use behavior::{Behavior, BehaviorChain, FnBehavior, Next};
pub use config::{
    BufferConfig, ConfigError, ConnectionSettings, PublisherConfig, RetryConfig, RetryStrategy,
    DEFAULT_CONNECTION,
};
pub use error::{FailureKind, PipelineError, PublishError, PublishingError};
pub use message::{
    headers, Batch, BatchBuilder, BuildError, CancellationToken, Cancelled, HeaderValue, Headers,
    Message, MessageBuilder, Routing, DEFAULT_PUBLISHING_TIMEOUT,
};
#[cfg(feature = "emitter")]
pub use publisher::{EmitterObserver, COMPLETED_EVENT, FAILED_EVENT, PUBLISHED_EVENT};
pub use publisher::{
    BufferedPublisher, CallbackObserver, ConfirmPublisher, NotConfirmedPolicy, Observer,
    Publisher, PublisherBuilder, StageError, Subscription,
};
pub use retry::{retry_until, ArithmeticBackoff, Backoff, GeometricBackoff, RetryBehavior};
pub use serializer::{
    BitcodeSerializer, JsonSerializer, Payload, RawSerializer, SerializeError, Serializer,
};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
