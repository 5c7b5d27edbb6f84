//! Message model - routing, messages, and immutable batches.

mod batch;
mod cancellation;
pub mod headers;
mod message;
mod routing;

pub use batch::{Batch, BatchBuilder, DEFAULT_PUBLISHING_TIMEOUT};
pub use cancellation::{CancellationToken, Cancelled};
pub use headers::{HeaderValue, Headers};
pub use message::{BuildError, Message, MessageBuilder};
pub use routing::Routing;
