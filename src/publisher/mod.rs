//! Publishing - the facade, its observers and the terminal broker step.
//!
//! ```text
//!            publish / publish_batch
//!                      │
//!                      ▼
//! ┌───────────────────────────────────────────┐
//! │ Publisher                                 │
//! │   BehaviorChain                           │
//! │     RetryBehavior ─▶ ... ─▶ ConfirmPublisher ──▶ Session ──▶ broker
//! └──────────────────────┬────────────────────┘
//!                        │ after the chain returns
//!                        ▼
//!          on_next(success) / on_error(failed)
//!                   Observers
//! ```
//!
//! [`BufferedPublisher`] sits in front of a `Publisher` and turns single
//! publishes into batches.

mod buffered;
mod confirm;
#[cfg(feature = "emitter")]
mod emitter;
mod facade;
mod observer;

pub use buffered::BufferedPublisher;
pub use confirm::{ConfirmPublisher, StageError};
#[cfg(feature = "emitter")]
pub use emitter::{EmitterObserver, COMPLETED_EVENT, FAILED_EVENT, PUBLISHED_EVENT};
pub use facade::{NotConfirmedPolicy, Publisher, PublisherBuilder};
pub use observer::{CallbackObserver, Observer, Subscription};
