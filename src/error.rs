//! Error types shared by the behavior chain and the publisher facade.
//!
//! The important property is that a publishing failure always carries the
//! batch of messages that did not make it. Callers derive the successful
//! remainder as `input.except(error.batch())`, and retry behaviors narrow the
//! next attempt to that same batch.

use std::error::Error;

use crate::message::Batch;
use crate::transport::{TransportError, TransportErrorKind};

/// What went wrong for the messages attached to a [`PublishingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Every message in the batch failed staging; nothing was sent.
    TotalFailure,
    /// Some messages failed staging; the rest were sent and confirmed.
    PartialFailure,
    /// The broker did not acknowledge the staged sends in time.
    NotConfirmed,
    /// The broker refused access (reply code 403).
    Forbidden,
    /// The destination does not exist (reply code 404).
    NotFound,
    /// Anything else, attributed to the whole batch.
    Unclassified,
}

/// A failure scoped to a batch of messages.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PublishingError {
    kind: FailureKind,
    batch: Batch,
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl PublishingError {
    pub fn new(kind: FailureKind, batch: Batch, message: impl Into<String>) -> Self {
        Self {
            kind,
            batch,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn total_failure(batch: Batch) -> Self {
        Self::new(FailureKind::TotalFailure, batch, "All messages failed.")
    }

    pub fn partial_failure(failed: Batch) -> Self {
        Self::new(FailureKind::PartialFailure, failed, "A few messages failed.")
    }

    pub fn not_confirmed(batch: Batch) -> Self {
        Self::new(
            FailureKind::NotConfirmed,
            batch,
            "The publishing was not confirmed.",
        )
    }

    /// Attribute any pipeline failure to a batch. Errors that already carry
    /// their own failed subset are returned unchanged.
    pub fn from_pipeline(batch: Batch, error: PipelineError) -> Self {
        match error {
            PipelineError::Publishing(error) => error,
            PipelineError::Transport(error) => {
                let kind = match error.kind() {
                    TransportErrorKind::Forbidden => FailureKind::Forbidden,
                    TransportErrorKind::NotFound => FailureKind::NotFound,
                    _ => FailureKind::Unclassified,
                };
                Self::new(kind, batch, error.to_string()).with_source(error)
            }
            PipelineError::Disposed => Self::new(
                FailureKind::Unclassified,
                batch,
                "publisher has been disposed",
            ),
            PipelineError::Other(error) => {
                Self::new(FailureKind::Unclassified, batch, "Failed to publish batch.")
                    .with_source(error)
            }
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The messages that did not make it.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error returned by a [`Behavior`](crate::Behavior).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Publishing(#[from] PublishingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("publisher has been disposed")]
    Disposed,
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl PipelineError {
    pub fn other(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        PipelineError::Other(error.into())
    }

    /// The refined subset of messages that failed, when the error knows it.
    pub fn failed_batch(&self) -> Option<&Batch> {
        match self {
            PipelineError::Publishing(error) => Some(error.batch()),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Disposed)
    }
}

/// Error returned synchronously by [`Publisher`](crate::Publisher) calls.
///
/// Publishing failures normally reach callers only through observers; these
/// are the exceptions.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publisher has been disposed")]
    Disposed,
    /// Only returned under [`NotConfirmedPolicy::Raise`](crate::NotConfirmedPolicy::Raise).
    #[error(transparent)]
    NotConfirmed(PublishingError),
}
