use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::{Behavior, Next};
use crate::error::PipelineError;
use crate::message::{Batch, CancellationToken};

/// An ordered pipeline of behaviors ending in a terminal behavior.
///
/// The first behavior passed to [`create`](Self::create) is the outermost: it
/// sees the raw batch first and the final outcome last. Each behavior only
/// knows its `next`, never its position.
pub struct BehaviorChain {
    /// Outermost first, terminal last.
    steps: Vec<Box<dyn Behavior>>,
    disposed: AtomicBool,
}

impl BehaviorChain {
    pub fn create<I>(terminal: Box<dyn Behavior>, behaviors: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Behavior>>,
    {
        let mut steps: Vec<Box<dyn Behavior>> = behaviors.into_iter().collect();
        steps.push(terminal);
        Self {
            steps,
            disposed: AtomicBool::new(false),
        }
    }

    /// Step names, outermost first.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn run(
        &self,
        index: usize,
        batch: Batch,
        cancel: &CancellationToken,
        tail: Next<'_>,
    ) -> Result<(), PipelineError> {
        let Some(step) = self.steps.get(index) else {
            return tail.run(batch, cancel);
        };
        let continue_with =
            |batch: Batch, cancel: &CancellationToken| self.run(index + 1, batch, cancel, tail);
        step.execute(batch, Next::new(&continue_with), cancel)
    }
}

impl Behavior for BehaviorChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn execute(
        &self,
        batch: Batch,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        self.run(0, batch, cancel, next)
    }

    /// Dispose every step, outermost first. Only the first call has an effect.
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for step in &self.steps {
            debug!(behavior = step.name(), "disposing behavior");
            step.dispose();
        }
    }
}

impl Drop for BehaviorChain {
    fn drop(&mut self) {
        self.dispose();
    }
}
