//! Bounded attempt history for a single retry session.
//!
//! [`Attempts`] keeps the most recent attempts of a session in execution
//! order, evicting the oldest once an optional capacity is exceeded. The
//! attempt counter is independent of eviction and always reports how many
//! times the operation actually ran.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::prelude::*;
//!
//! let attempts = repeatedly::run(|| Err::<(), _>("unreachable host"))
//!     .take(5)
//!     .execute(Some(2))
//!     .unwrap();
//!
//! assert_eq!(attempts.attempt_count(), 5);
//! assert_eq!(attempts.len(), 2);
//! assert!(!attempts.succeeded());
//! ```

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use crate::attempt::{Attempt, Deferred};
use crate::error::RepeatedFailure;

/// Ordered, capacity-limited record of a session's attempts.
///
/// Built by the executor and read-only to everyone else.
#[derive(Debug, Clone)]
pub struct Attempts<T, E> {
    retained: VecDeque<Deferred<T, E>>,
    capacity: Option<usize>,
    attempt_count: usize,
    begin: SystemTime,
    end: SystemTime,
}

impl<T, E> Attempts<T, E> {
    /// Start an empty history, stamping the session's begin time.
    ///
    /// A capacity of zero is treated as one so that the outcome of the final
    /// attempt is always observable.
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        let now = SystemTime::now();
        Self {
            retained: VecDeque::new(),
            capacity: capacity.map(|c| c.max(1)),
            attempt_count: 0,
            begin: now,
            end: now,
        }
    }

    /// Record a forced attempt, evicting the oldest one if over capacity.
    pub(crate) fn push(&mut self, attempt: Deferred<T, E>) {
        self.attempt_count += 1;
        self.retained.push_back(attempt);
        if let Some(capacity) = self.capacity {
            while self.retained.len() > capacity {
                self.retained.pop_front();
            }
        }
    }

    /// Stamp the session's end time.
    pub(crate) fn finish(&mut self) {
        self.end = SystemTime::now();
    }

    /// The successful attempt, if the last retained attempt succeeded.
    pub fn success(&self) -> Option<&Attempt<T, E>> {
        self.last().filter(|attempt| attempt.succeeded())
    }

    /// True if the history is non-empty and its last attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.success().is_some()
    }

    /// The most recent attempt.
    pub fn last(&self) -> Option<&Attempt<T, E>> {
        self.retained.back().map(Deferred::force)
    }

    /// Total number of attempts made, including evicted ones.
    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    /// Maximum number of attempts retained.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of attempts retained.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// True if no attempt is retained.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// When the session began.
    pub fn begin_time(&self) -> SystemTime {
        self.begin
    }

    /// When the session completed.
    pub fn end_time(&self) -> SystemTime {
        self.end
    }

    /// Duration of the whole session.
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.begin).unwrap_or_default()
    }

    /// Iterate retained attempts, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Attempt<T, E>> + ExactSizeIterator {
        self.retained.iter().map(Deferred::force)
    }

    /// Iterate retained attempts that failed, oldest first.
    pub fn failures(&self) -> impl Iterator<Item = &Attempt<T, E>> {
        self.iter().filter(|attempt| !attempt.succeeded())
    }

    /// Wrap this history in an aggregated failure.
    pub fn build_failure(self, message: Option<String>) -> RepeatedFailure<T, E> {
        RepeatedFailure::new(message, self)
    }
}

impl<'a, T, E> IntoIterator for &'a Attempts<T, E> {
    type Item = &'a Attempt<T, E>;
    type IntoIter = Box<dyn DoubleEndedIterator<Item = &'a Attempt<T, E>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
