//! Deferred attempts: thunks that run an operation at most once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::Attempt;

type Thunk<T, E> = Box<dyn FnOnce() -> Attempt<T, E> + Send>;

struct Shared<T, E> {
    outcome: OnceLock<Attempt<T, E>>,
    thunk: Mutex<Option<Thunk<T, E>>>,
    propagate: AtomicBool,
}

/// A lazily evaluated [`Attempt`].
///
/// Nothing runs until [`force`](Deferred::force) is called. The first call
/// invokes the operation and caches the outcome; every later call, from any
/// clone of the handle, returns the cached outcome. This lets sequence
/// operators look at an element that a downstream consumer already forced
/// without re-executing the operation.
///
/// Cloning is cheap: clones share the same thunk and outcome.
///
/// # Examples
///
/// ```rust
/// use reattempt::{Attempt, Deferred};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let deferred = {
///     let calls = calls.clone();
///     Deferred::new(move || {
///         Attempt::run(|| {
///             calls.fetch_add(1, Ordering::SeqCst);
///             Ok::<_, String>(())
///         })
///     })
/// };
///
/// assert!(!deferred.is_forced());
/// assert!(deferred.force().succeeded());
/// assert!(deferred.clone().force().succeeded());
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct Deferred<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Deferred<T, E> {
    /// Defer `thunk` until the attempt is forced.
    pub fn new<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Attempt<T, E> + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                outcome: OnceLock::new(),
                thunk: Mutex::new(Some(Box::new(thunk))),
                propagate: AtomicBool::new(false),
            }),
        }
    }

    /// Wrap an attempt that has already run.
    pub fn ready(attempt: Attempt<T, E>) -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: OnceLock::from(attempt),
                thunk: Mutex::new(None),
                propagate: AtomicBool::new(false),
            }),
        }
    }

    /// Run the operation if it has not run yet and return its outcome.
    ///
    /// # Panics
    ///
    /// Panics if the operation panicked during an earlier `force`.
    pub fn force(&self) -> &Attempt<T, E> {
        self.shared
            .outcome
            .get_or_init(|| take_thunk(&self.shared.thunk)())
    }

    /// The outcome, if the attempt has already been forced.
    pub fn get(&self) -> Option<&Attempt<T, E>> {
        self.shared.outcome.get()
    }

    /// True once the operation has run.
    pub fn is_forced(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// True if a propagation operator selected this attempt's error to end
    /// the session.
    pub fn is_propagated(&self) -> bool {
        self.shared.propagate.load(Ordering::Acquire)
    }

    pub(crate) fn mark_propagated(&self) {
        self.shared.propagate.store(true, Ordering::Release);
    }

    /// Take ownership of the outcome, forcing it first if needed.
    ///
    /// Fails, returning the handle unchanged, while other clones are alive.
    pub fn try_into_attempt(self) -> Result<Attempt<T, E>, Self> {
        let shared = Arc::try_unwrap(self.shared).map_err(|shared| Self { shared })?;
        let Shared { outcome, thunk, .. } = shared;
        Ok(match outcome.into_inner() {
            Some(attempt) => attempt,
            None => take_thunk(&thunk)(),
        })
    }
}

fn take_thunk<T, E>(slot: &Mutex<Option<Thunk<T, E>>>) -> Thunk<T, E> {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .expect("deferred attempt was poisoned by a panicking evaluation")
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> From<Attempt<T, E>> for Deferred<T, E> {
    fn from(attempt: Attempt<T, E>) -> Self {
        Self::ready(attempt)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(attempt) => f
                .debug_struct("Deferred")
                .field("outcome", attempt)
                .field("propagated", &self.is_propagated())
                .finish(),
            None => f.write_str("Deferred(<pending>)"),
        }
    }
}
