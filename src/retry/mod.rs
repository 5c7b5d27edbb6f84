//! Retry policies and the behavior that applies them.
//!
//! A [`Backoff`] is a pure function from attempt number to delay, optionally
//! bounded by a total attempt count and a maximum delay. [`RetryBehavior`]
//! wraps the rest of the chain in a loop driven by one.
//!
//! ```text
//! attempt 1 ──▶ next(batch [a, b, c]) ──▶ Err(partial: [b, c])
//!   wait delay_for_attempt(1)
//! attempt 2 ──▶ next(batch [b, c])    ──▶ Ok
//! ```
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use confirm_relay::{ArithmeticBackoff, Backoff, RetryBehavior};
//!
//! let backoff = ArithmeticBackoff::new(50, Duration::from_millis(100)).with_max_attempts(3);
//! assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(150));
//!
//! let retry = RetryBehavior::new(backoff);
//! ```

mod backoff;
mod behavior;

pub use backoff::{ArithmeticBackoff, Backoff, GeometricBackoff};
pub use behavior::{retry_until, RetryBehavior};
