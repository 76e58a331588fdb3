//! Infinite generators of deferred attempts.
//!
//! The generator knows nothing about limits or delays: it yields a fresh
//! [`Deferred`] every time it is polled, forever. Bounding the sequence is the
//! job of the operators in [`crate::sequence`] and [`crate::pipeline`].
//!
//! # Examples
//!
//! ```rust
//! use reattempt::repeatedly;
//!
//! let mut attempts = repeatedly::get(|| Err::<i32, _>("offline"), -1).take(3);
//! let first = attempts.next().unwrap();
//! assert_eq!(*first.force().value(), -1);
//! assert_eq!(attempts.count(), 2);
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use super::{Attempt, Deferred};

/// Lazily yields one deferred attempt of an operation per call to `next`.
///
/// Created by [`run`] and [`get`]. Restarting means creating a new generator.
pub struct Repeatedly<F, T> {
    operation: Arc<F>,
    default: T,
}

/// Repeatedly yield a deferred invocation of a side-effecting `action`.
pub fn run<F, E>(action: F) -> Repeatedly<F, ()>
where
    F: Fn() -> Result<(), E> + Send + Sync + 'static,
{
    get(action, ())
}

/// Repeatedly yield a deferred invocation of `factory`.
///
/// Failed attempts carry a clone of `default` as their value.
pub fn get<F, T, E>(factory: F, default: T) -> Repeatedly<F, T>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    Repeatedly {
        operation: Arc::new(factory),
        default,
    }
}

impl<F, T, E> Iterator for Repeatedly<F, T>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    type Item = Deferred<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let operation = Arc::clone(&self.operation);
        let default = self.default.clone();
        Some(Deferred::new(move || Attempt::get(|| operation(), default)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<F, T, E> FusedIterator for Repeatedly<F, T>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
}

impl<F, T: fmt::Debug> fmt::Debug for Repeatedly<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeatedly")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}
