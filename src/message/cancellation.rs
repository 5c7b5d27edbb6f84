use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Returned by [`CancellationToken::sleep`] when the wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

struct Signal {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Cooperative cancellation signal.
///
/// Cloning a token yields another handle to the same signal, so a caller can
/// keep one handle and hand the other to a message or a publish call.
///
/// ```
/// use confirm_relay::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(Signal {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// A fresh token nobody else holds; it only fires if cancelled through
    /// one of its own clones.
    pub fn none() -> Self {
        Self::new()
    }

    /// Request cancellation and wake every pending [`sleep`](Self::sleep).
    pub fn cancel(&self) {
        let _guard = self.signal.lock.lock();
        self.signal.cancelled.store(true, Ordering::SeqCst);
        self.signal.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::SeqCst)
    }

    /// Block for `duration`, returning early with [`Cancelled`] if the token
    /// fires first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        // `None` when the deadline is past the clock's range: wait for cancel only.
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.signal.lock.lock();
        loop {
            if self.is_cancelled() {
                return Err(Cancelled);
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.signal.wake.wait_for(&mut guard, deadline - now);
                }
                None => self.signal.wake.wait(&mut guard),
            }
        }
    }
}
