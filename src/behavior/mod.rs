//! Behaviors - composable steps around the terminal publish action.
//!
//! A behavior receives the batch, a continuation for the rest of the chain,
//! and the caller's cancellation token. It can pass through, retry the
//! continuation, inspect the batch on either side of the call, or stop the
//! chain by returning without calling `next`.
//!
//! ```text
//! Publisher::publish_batch
//!        │
//!        ▼
//! ┌───────────────┐  next  ┌───────────────┐  next  ┌──────────────────┐
//! │ RetryBehavior │ ─────▶ │ custom step   │ ─────▶ │ ConfirmPublisher │ ──▶ broker
//! │  (outermost)  │ ◀───── │               │ ◀───── │   (terminal)     │
//! └───────────────┘ result └───────────────┘ result └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let chain = BehaviorChain::create(
//!     Box::new(ConfirmPublisher::new(broker)),
//!     vec![Box::new(RetryBehavior::new(backoff)) as Box<dyn Behavior>],
//! );
//! chain.execute(batch, Next::end(), &CancellationToken::none())?;
//! ```

mod chain;
mod function;

use std::sync::Arc;

use crate::error::PipelineError;
use crate::message::{Batch, CancellationToken};

pub use chain::BehaviorChain;
pub use function::FnBehavior;

type Continuation<'a> = dyn Fn(Batch, &CancellationToken) -> Result<(), PipelineError> + 'a;

/// The rest of the chain, as seen from one behavior.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    continuation: Option<&'a Continuation<'a>>,
}

impl<'a> Next<'a> {
    pub fn new(continuation: &'a Continuation<'a>) -> Self {
        Self {
            continuation: Some(continuation),
        }
    }

    /// Continuation that does nothing; handed to the innermost behavior.
    pub fn end() -> Self {
        Self { continuation: None }
    }

    /// Run the rest of the chain with `batch`.
    pub fn run(&self, batch: Batch, cancel: &CancellationToken) -> Result<(), PipelineError> {
        match self.continuation {
            Some(continuation) => continuation(batch, cancel),
            None => Ok(()),
        }
    }
}

/// A step in the publish pipeline.
pub trait Behavior: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError>;

    /// Release resources held by this behavior. Called once by the owning
    /// chain; implementations should tolerate repeated calls.
    fn dispose(&self) {}
}

impl<B: Behavior + ?Sized> Behavior for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        (**self).execute(batch, next, cancel)
    }

    fn dispose(&self) {
        (**self).dispose()
    }
}

impl<B: Behavior + ?Sized> Behavior for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        (**self).execute(batch, next, cancel)
    }

    fn dispose(&self) {
        (**self).dispose()
    }
}
