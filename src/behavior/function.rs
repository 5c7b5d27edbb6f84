use super::{Behavior, Next};
use crate::error::PipelineError;
use crate::message::{Batch, CancellationToken};

type Handler =
    dyn Fn(Batch, Next<'_>, &CancellationToken) -> Result<(), PipelineError> + Send + Sync;

/// A behavior backed by a closure.
///
/// ```
/// use confirm_relay::{FnBehavior, PipelineError};
///
/// let reject_empty = FnBehavior::new("reject-empty", |batch, next, cancel| {
///     if batch.is_empty() {
///         return Err(PipelineError::other("empty batch"));
///     }
///     next.run(batch, cancel)
/// });
/// ```
pub struct FnBehavior {
    name: String,
    handler: Box<Handler>,
}

impl FnBehavior {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Batch, Next<'_>, &CancellationToken) -> Result<(), PipelineError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

impl Behavior for FnBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        (self.handler)(batch, next, cancel)
    }
}
