use tracing::{debug, warn};

use super::Backoff;
use crate::behavior::{Behavior, Next};
use crate::error::PipelineError;
use crate::message::{Batch, CancellationToken};

/// Retries the rest of the chain under a [`Backoff`].
///
/// When a failure names the messages that did not make it, the next attempt
/// runs with only those messages. Exhausting the attempts, or a cancelled
/// backoff wait, returns the last error unchanged.
pub struct RetryBehavior<B> {
    backoff: B,
}

impl<B: Backoff> RetryBehavior<B> {
    pub fn new(backoff: B) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    fn exhausted(&self, attempt: u32) -> bool {
        match self.backoff.max_attempts() {
            Some(max) => attempt >= max.max(1),
            None => false,
        }
    }
}

impl<B: Backoff> Behavior for RetryBehavior<B> {
    fn name(&self) -> &str {
        "retry"
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let mut batch = batch;
        let mut attempt = 1;
        loop {
            let error = match next.run(batch.clone(), cancel) {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            if !error.is_retryable() || self.exhausted(attempt) {
                return Err(error);
            }

            if let Some(failed) = error.failed_batch() {
                batch = failed.clone();
            }
            let delay = self.backoff.delay_for_attempt(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                remaining = batch.len(),
                error = %error,
                "publish attempt failed, retrying"
            );

            if cancel.sleep(delay).is_err() {
                debug!(attempt, "retry cancelled during backoff");
                return Err(error);
            }
            attempt += 1;
        }
    }
}

/// Run `operation` until it returns `true`, waiting between attempts.
///
/// `operation` receives the 1-based attempt number. Returns `false` when
/// attempts run out or `cancel` fires during a wait.
pub fn retry_until<B, F>(backoff: &B, cancel: &CancellationToken, mut operation: F) -> bool
where
    B: Backoff + ?Sized,
    F: FnMut(u32) -> bool,
{
    let mut attempt = 1;
    loop {
        if operation(attempt) {
            return true;
        }
        if let Some(max) = backoff.max_attempts() {
            if attempt >= max.max(1) {
                return false;
            }
        }
        let delay = backoff.delay_for_attempt(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "attempt unsuccessful, retrying");
        if cancel.sleep(delay).is_err() {
            return false;
        }
        attempt += 1;
    }
}
