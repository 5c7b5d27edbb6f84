use std::sync::Arc;
use std::time::Duration;

use super::message::Message;

/// Confirmation wait used when a batch does not set its own.
pub const DEFAULT_PUBLISHING_TIMEOUT: Duration = Duration::from_millis(500);

/// An ordered group of messages published under one confirmation wait.
///
/// Membership is fixed at construction. Every narrowing operation returns a
/// new batch, so a failed subset handed to an observer can never change under
/// it. Messages are compared by identity (the `Arc`), not by content.
#[derive(Debug, Clone)]
pub struct Batch {
    messages: Arc<[Arc<Message>]>,
    publishing_timeout: Duration,
}

impl Batch {
    pub fn new<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = Arc<Message>>,
    {
        Self {
            messages: messages.into_iter().collect(),
            publishing_timeout: DEFAULT_PUBLISHING_TIMEOUT,
        }
    }

    pub fn single(message: impl Into<Arc<Message>>) -> Self {
        Self::new([message.into()])
    }

    pub fn builder() -> BatchBuilder {
        BatchBuilder::default()
    }

    /// Same messages, different confirmation timeout.
    pub fn with_timeout(&self, publishing_timeout: Duration) -> Self {
        Self {
            messages: Arc::clone(&self.messages),
            publishing_timeout,
        }
    }

    pub fn publishing_timeout(&self) -> Duration {
        self.publishing_timeout
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Message>> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, message: &Arc<Message>) -> bool {
        self.messages.iter().any(|m| Arc::ptr_eq(m, message))
    }

    /// A new batch with `messages`, keeping this batch's timeout.
    pub fn only<I>(&self, messages: I) -> Self
    where
        I: IntoIterator<Item = Arc<Message>>,
    {
        Self::new(messages).with_timeout(self.publishing_timeout)
    }

    /// Messages of `self` that are not in `other`, in original order.
    pub fn except(&self, other: &Batch) -> Self {
        self.only(self.messages.iter().filter(|m| !other.contains(m)).cloned())
    }

    /// This batch followed by the messages of `other` not already present.
    pub fn union(&self, other: &Batch) -> Self {
        let extra = other.except(self);
        self.only(self.messages.iter().chain(extra.iter()).cloned())
    }

    pub fn correlation_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.correlation_id()).collect()
    }

    /// True when both batches hold the same message list (not just equal
    /// members).
    pub fn same_instance(&self, other: &Batch) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Arc<Message>;
    type IntoIter = std::slice::Iter<'a, Arc<Message>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<Message> for Batch {
    fn from(message: Message) -> Self {
        Batch::single(message)
    }
}

impl From<Arc<Message>> for Batch {
    fn from(message: Arc<Message>) -> Self {
        Batch::single(message)
    }
}

/// Fluent construction of a [`Batch`].
#[derive(Default)]
pub struct BatchBuilder {
    messages: Vec<Arc<Message>>,
    publishing_timeout: Option<Duration>,
}

impl BatchBuilder {
    pub fn message(mut self, message: impl Into<Arc<Message>>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn messages<I>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = Arc<Message>>,
    {
        self.messages.extend(messages);
        self
    }

    pub fn publishing_timeout(mut self, timeout: Duration) -> Self {
        self.publishing_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Batch {
        Batch::new(self.messages)
            .with_timeout(self.publishing_timeout.unwrap_or(DEFAULT_PUBLISHING_TIMEOUT))
    }
}
