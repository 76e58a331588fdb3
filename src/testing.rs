//! Testing utilities for code that runs retry sessions.
//!
//! # Examples
//!
//! ## FlakyOperation
//!
//! ```rust
//! use reattempt::prelude::*;
//! use reattempt::testing::FlakyOperation;
//!
//! let flaky = FlakyOperation::new(2, "connection reset");
//! let attempts = repeatedly::run(flaky.action()).take(5).execute(None).unwrap();
//!
//! assert!(attempts.succeeded());
//! assert_eq!(flaky.calls(), 3);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use reattempt::prelude::*;
//! use reattempt::{assert_session_failed, assert_session_succeeded};
//!
//! let ok = repeatedly::run(|| Ok::<(), &str>(())).take(1).execute(None);
//! assert_session_succeeded!(ok);
//!
//! let failed = repeatedly::run(|| Err::<(), _>("down")).take(2).execute(None);
//! assert_session_failed!(failed);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An operation that fails a fixed number of times, then succeeds.
///
/// Clones share the same call counter.
#[derive(Clone)]
pub struct FlakyOperation<E> {
    failures: usize,
    error: E,
    calls: Arc<AtomicUsize>,
}

impl<E> FlakyOperation<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Fail `failures` times with `error`, then succeed forever.
    pub fn new(failures: usize, error: E) -> Self {
        Self {
            failures,
            error,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Invoke the operation once.
    pub fn call(&self) -> Result<(), E> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }

    /// The operation as a closure suitable for [`repeatedly::run`](crate::repeatedly::run).
    pub fn action(&self) -> impl Fn() -> Result<(), E> + Send + Sync + 'static {
        let operation = self.clone();
        move || operation.call()
    }

    /// How many times the operation has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<E: fmt::Debug> fmt::Debug for FlakyOperation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakyOperation")
            .field("failures", &self.failures)
            .field("error", &self.error)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

/// Assert that a session result holds a successful history.
///
/// This macro will panic if the session propagated an error or ended without
/// a success.
///
/// # Example
///
/// ```rust
/// use reattempt::prelude::*;
/// use reattempt::assert_session_succeeded;
///
/// let result = repeatedly::run(|| Ok::<(), &str>(())).take(3).execute(None);
/// assert_session_succeeded!(result);
/// ```
#[macro_export]
macro_rules! assert_session_succeeded {
    ($result:expr) => {
        match $result {
            Ok(attempts) => {
                if !attempts.succeeded() {
                    panic!(
                        "Expected a successful session, got {} failed attempts",
                        attempts.attempt_count()
                    );
                }
            }
            Err(e) => {
                panic!("Expected a successful session, got error: {:?}", e);
            }
        }
    };
}

/// Assert that a session did not succeed.
///
/// Accepts the result of any executor: an `Err`, or an `Ok` history without
/// a success, passes. The optional second argument is the expected number
/// of attempts.
///
/// # Example
///
/// ```rust
/// use reattempt::prelude::*;
/// use reattempt::assert_session_failed;
///
/// let result = repeatedly::run(|| Err::<(), _>("down")).take(3).execute(None);
/// assert_session_failed!(result, 3);
/// ```
#[macro_export]
macro_rules! assert_session_failed {
    ($result:expr) => {
        match $result {
            Err(_) => {}
            Ok(attempts) => {
                if attempts.succeeded() {
                    panic!(
                        "Expected a failed session, got success after {} attempts",
                        attempts.attempt_count()
                    );
                }
            }
        }
    };
    ($result:expr, $attempts:expr) => {
        match $result {
            Err(e) => {
                panic!(
                    "Expected a failed session with {} attempts, got error: {:?}",
                    $attempts, e
                );
            }
            Ok(attempts) => {
                if attempts.succeeded() {
                    panic!(
                        "Expected a failed session, got success after {} attempts",
                        attempts.attempt_count()
                    );
                }
                assert_eq!(attempts.attempt_count(), $attempts);
            }
        }
    };
}
