//! Cooperative cancellation for retry sessions.
//!
//! A [`CancellationToken`] is checked at every iteration boundary of a
//! session and interrupts the inter-failure delay. Cancelling never raises an
//! error: the session simply stops yielding attempts, and an attempt that is
//! already running is allowed to finish.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct Signal {
    cancelled: Mutex<bool>,
    changed: Condvar,
}

/// A cloneable, thread-safe cancellation signal.
///
/// All clones observe the same state. A fresh token is never cancelled until
/// [`cancel`](CancellationToken::cancel) is called on one of its clones.
///
/// # Examples
///
/// ```rust
/// use reattempt::CancellationToken;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let remote = token.clone();
///
/// std::thread::spawn(move || remote.cancel());
///
/// // Returns early once the other thread cancels.
/// let cancelled = token.wait_timeout(Duration::from_secs(30));
/// assert!(cancelled);
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation, waking every thread blocked in
    /// [`wait_timeout`](CancellationToken::wait_timeout).
    pub fn cancel(&self) {
        let mut cancelled = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.signal.changed.notify_all();
    }

    /// True once any clone has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`, returning early if cancelled.
    ///
    /// Returns `true` if the token was cancelled before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if timeout.is_zero() {
            return *guard;
        }
        let (guard, _) = self
            .signal
            .changed
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_new_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_times_out_without_cancel() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_is_interrupted_by_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_debug_shows_state() {
        let token = CancellationToken::new();
        assert!(format!("{:?}", token).contains("cancelled: false"));
    }
}
