use std::sync::Arc;
use std::time::Duration;

/// Computes how long to wait after a failed attempt.
///
/// `attempt` is 1-based: `delay_for_attempt(1)` is the wait between the first
/// and second attempts.
pub trait Backoff: Send + Sync {
    fn delay_for_attempt(&self, attempt: u32) -> Duration;

    /// Total number of attempts allowed, the first one included. `None` means
    /// unbounded.
    fn max_attempts(&self) -> Option<u32>;
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (**self).delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> Option<u32> {
        (**self).max_attempts()
    }
}

impl<B: Backoff + ?Sized> Backoff for Arc<B> {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (**self).delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> Option<u32> {
        (**self).max_attempts()
    }
}

fn cap(delay: Duration, max_delay: Option<Duration>) -> Duration {
    match max_delay {
        Some(max) if delay > max => max,
        _ => delay,
    }
}

/// `delay + (attempt - 1) * coefficient` milliseconds, never below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmeticBackoff {
    coefficient_ms: i64,
    delay: Duration,
    max_attempts: Option<u32>,
    max_delay: Option<Duration>,
}

impl ArithmeticBackoff {
    pub fn new(coefficient_ms: i64, delay: Duration) -> Self {
        Self {
            coefficient_ms,
            delay,
            max_attempts: None,
            max_delay: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

impl Backoff for ArithmeticBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let steps = i128::from(attempt.max(1) - 1);
        let nanos = self.delay.as_nanos() as i128
            + steps * i128::from(self.coefficient_ms) * 1_000_000;
        let delay = if nanos <= 0 {
            Duration::ZERO
        } else {
            let nanos = u128::try_from(nanos).unwrap_or(u128::MAX);
            let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
            Duration::new(secs, (nanos % 1_000_000_000) as u32)
        };
        cap(delay, self.max_delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// `delay * coefficient^(attempt - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricBackoff {
    coefficient: f64,
    delay: Duration,
    max_attempts: Option<u32>,
    max_delay: Option<Duration>,
}

impl GeometricBackoff {
    pub fn new(coefficient: f64, delay: Duration) -> Self {
        Self {
            coefficient,
            delay,
            max_attempts: None,
            max_delay: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

impl Backoff for GeometricBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = f64::from(attempt.max(1) - 1);
        let secs = self.delay.as_secs_f64() * self.coefficient.powf(exponent);
        let delay = match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay,
            Err(_) if secs.is_nan() || secs < 0.0 => Duration::ZERO,
            Err(_) => Duration::MAX,
        };
        cap(delay, self.max_delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}
