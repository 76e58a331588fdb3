//! Attempt pipelines: operators and executors over sequences of deferred
//! attempts.
//!
//! A session is built in three steps:
//!
//! 1. A generator from [`repeatedly`](crate::repeatedly) yields an infinite
//!    sequence of [`Deferred`] attempts.
//! 2. Operators bound and shape the sequence: `take` (attempt limit),
//!    [`take_for_duration`](crate::SequenceExt::take_for_duration),
//!    [`delay_where_failed`](AttemptSequenceExt::delay_where_failed),
//!    [`throw_where`](AttemptSequenceExt::throw_where) and
//!    [`catch_where`](AttemptSequenceExt::catch_where). A [`RetryStrategy`]
//!    applies all of them at once via
//!    [`using_strategy`](AttemptSequenceExt::using_strategy).
//! 3. An executor forces the attempts one at a time until the first success
//!    or until the sequence ends: [`execute`](AttemptSequenceExt::execute),
//!    [`throw_if_cant_succeed`](AttemptSequenceExt::throw_if_cant_succeed) or
//!    [`value_or_default`](AttemptSequenceExt::value_or_default).
//!
//! # Examples
//!
//! ```rust
//! use reattempt::prelude::*;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let calls = Arc::new(AtomicU32::new(0));
//! let strategy = RetryStrategy::new()
//!     .with_attempt_limit(5)
//!     .with_failure_delay(Duration::from_millis(1));
//!
//! let attempts = {
//!     let calls = calls.clone();
//!     strategy.run(
//!         move || {
//!             if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!                 Err("connection reset")
//!             } else {
//!                 Ok(())
//!             }
//!         },
//!         &CancellationToken::new(),
//!     )
//! }
//! .execute(None)
//! .unwrap();
//!
//! assert!(attempts.succeeded());
//! assert_eq!(attempts.attempt_count(), 3);
//! ```
//!
//! # Propagation
//!
//! Iterators cannot raise, so a propagating operator ends the sequence right
//! after the matching attempt and marks it (see
//! [`Deferred::is_propagated`]). The executors turn a marked attempt into an
//! `Err` and do not record it in the history.

use std::iter::FusedIterator;
use std::time::Duration;

use crate::attempt::{repeatedly, Deferred};
use crate::cancel::CancellationToken;
use crate::error::{Propagated, SessionError};
use crate::history::Attempts;
use crate::sequence::{DelayWhere, SequenceExt};
use crate::strategy::{DelayAdjustment, RetryStrategy};

/// A type-erased attempt sequence, as produced by
/// [`using_strategy`](AttemptSequenceExt::using_strategy).
pub type BoxedAttempts<'a, T, E> = Box<dyn Iterator<Item = Deferred<T, E>> + Send + 'a>;

type FailedPredicate<T, E> = fn(&Deferred<T, E>) -> bool;

fn failed<T, E>(attempt: &Deferred<T, E>) -> bool {
    !attempt.force().succeeded()
}

/// Ends the sequence after a failed attempt whose error selects it for
/// propagation.
///
/// An error is propagated when `predicate(error) == propagate_if`, so
/// [`throw_where`](AttemptSequenceExt::throw_where) and
/// [`catch_where`](AttemptSequenceExt::catch_where) are the same operator
/// with opposite polarity.
#[derive(Debug, Clone)]
pub struct PropagateWhere<I, P> {
    inner: I,
    predicate: P,
    propagate_if: bool,
    done: bool,
}

impl<I, P, T, E> Iterator for PropagateWhere<I, P>
where
    I: Iterator<Item = Deferred<T, E>>,
    P: FnMut(&E) -> bool,
{
    type Item = Deferred<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(item) = self.inner.next() else {
            self.done = true;
            return None;
        };
        if let Some(error) = item.force().error() {
            if (self.predicate)(error) == self.propagate_if {
                item.mark_propagated();
            }
        }
        // Also honours marks set by an upstream propagation operator.
        self.done = item.is_propagated();
        Some(item)
    }
}

impl<I, P, T, E> FusedIterator for PropagateWhere<I, P>
where
    I: Iterator<Item = Deferred<T, E>>,
    P: FnMut(&E) -> bool,
{
}

/// Operators and executors for sequences of [`Deferred`] attempts.
pub trait AttemptSequenceExt<T, E>: Iterator<Item = Deferred<T, E>> + Sized {
    /// Wait `delay` after each failed attempt before pulling the next one,
    /// advancing the delay by `adjustment` after every failure.
    ///
    /// Cancelling `token` interrupts the wait and ends the sequence without
    /// an error. No wait follows the final attempt.
    fn delay_where_failed(
        self,
        delay: Duration,
        adjustment: Option<DelayAdjustment>,
        token: &CancellationToken,
    ) -> DelayWhere<Self, FailedPredicate<T, E>> {
        self.delay_where(failed as FailedPredicate<T, E>, delay, adjustment, token)
    }

    /// End the sequence with the first failed attempt whose error satisfies
    /// `predicate`.
    fn throw_where<P>(self, predicate: P) -> PropagateWhere<Self, P>
    where
        P: FnMut(&E) -> bool,
    {
        self.propagate_where(predicate, true)
    }

    /// End the sequence with the first failed attempt whose error does not
    /// satisfy `predicate`.
    fn catch_where<P>(self, predicate: P) -> PropagateWhere<Self, P>
    where
        P: FnMut(&E) -> bool,
    {
        self.propagate_where(predicate, false)
    }

    /// End the sequence with the first failed attempt for which
    /// `predicate(error) == propagate_if`.
    fn propagate_where<P>(self, predicate: P, propagate_if: bool) -> PropagateWhere<Self, P>
    where
        P: FnMut(&E) -> bool,
    {
        PropagateWhere {
            inner: self,
            predicate,
            propagate_if,
            done: false,
        }
    }

    /// Shape the sequence according to `strategy`.
    ///
    /// Operators are applied in this order: cancellation halt, attempt limit,
    /// failure delay, duration bound, throw predicate, catch predicate. No
    /// attempt starts after a wait that ran past `max_duration`.
    fn using_strategy<'a>(
        self,
        strategy: &RetryStrategy<E>,
        token: &CancellationToken,
    ) -> BoxedAttempts<'a, T, E>
    where
        Self: Send + 'a,
        T: Send + Sync + 'a,
        E: Send + Sync + 'a,
    {
        let mut attempts: BoxedAttempts<'a, T, E> = Box::new(self.take_until_cancelled(token));

        if let Some(limit) = strategy.attempt_limit() {
            attempts = Box::new(attempts.take(limit));
        }

        let adjustment = strategy.failure_delay_adjustment().cloned();
        if !strategy.failure_delay().is_zero() || adjustment.is_some() {
            attempts = Box::new(attempts.delay_where_failed(
                strategy.failure_delay(),
                adjustment,
                token,
            ));
        }

        if let Some(max_duration) = strategy.max_duration() {
            attempts = Box::new(attempts.take_for_duration(max_duration, token));
        }

        if let Some(predicate) = strategy.throw_predicate().cloned() {
            attempts = Box::new(attempts.throw_where(move |error: &E| predicate(error)));
        }

        if let Some(predicate) = strategy.catch_predicate().cloned() {
            attempts = Box::new(attempts.catch_where(move |error: &E| predicate(error)));
        }

        attempts
    }

    /// Force attempts one at a time until the first success or the end of
    /// the sequence.
    ///
    /// The returned history retains at most `max_retained` attempts. A
    /// history that is not `succeeded()` means the sequence ran out (attempt
    /// limit, duration bound or cancellation). A propagated attempt is
    /// returned as `Err` and is not recorded.
    fn execute(mut self, max_retained: Option<usize>) -> Result<Attempts<T, E>, Propagated<T, E>> {
        let mut attempts = Attempts::new(max_retained);
        let mut propagated = None;

        for attempt in self.by_ref() {
            let outcome = attempt.force();
            let succeeded = outcome.succeeded();

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = attempts.attempt_count() + 1,
                succeeded,
                duration = ?outcome.duration(),
                "attempt finished"
            );

            if attempt.is_propagated() {
                propagated = Some(attempt);
                break;
            }
            attempts.push(attempt);
            if succeeded {
                break;
            }
        }

        // Release the operators' clones so the propagated attempt is unique.
        drop(self);
        attempts.finish();

        if let Some(attempt) = propagated {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempts = attempts.attempt_count() + 1,
                "session ended by a propagated error"
            );
            return Err(Propagated::new(attempt));
        }

        #[cfg(feature = "tracing")]
        log_session_end(&attempts);

        Ok(attempts)
    }

    /// Like [`execute`](AttemptSequenceExt::execute), but fail with an
    /// aggregated [`RepeatedFailure`](crate::RepeatedFailure) if no attempt
    /// succeeded.
    fn throw_if_cant_succeed(
        self,
        message: Option<&str>,
        max_retained: Option<usize>,
    ) -> Result<Attempts<T, E>, SessionError<T, E>> {
        let attempts = self.execute(max_retained)?;
        if attempts.succeeded() {
            Ok(attempts)
        } else {
            Err(attempts.build_failure(message.map(str::to_owned)).into())
        }
    }

    /// The value of the first successful attempt.
    ///
    /// Falls back to the value (the caller's default) of the last attempt, or
    /// to `T::default()` if the sequence produced no attempt.
    fn value_or_default(mut self) -> Result<T, Propagated<T, E>>
    where
        T: Clone + Default,
    {
        let mut value = T::default();
        let mut propagated = None;

        for attempt in self.by_ref() {
            if attempt.is_propagated() {
                propagated = Some(attempt);
                break;
            }
            let outcome = attempt.force();
            value = outcome.value().clone();
            if outcome.succeeded() {
                break;
            }
        }

        drop(self);
        match propagated {
            Some(attempt) => Err(Propagated::new(attempt)),
            None => Ok(value),
        }
    }
}

impl<I, T, E> AttemptSequenceExt<T, E> for I where I: Iterator<Item = Deferred<T, E>> {}

#[cfg(feature = "tracing")]
fn log_session_end<T, E>(attempts: &Attempts<T, E>) {
    if attempts.succeeded() {
        tracing::debug!(
            attempts = attempts.attempt_count(),
            duration = ?attempts.duration(),
            "session succeeded"
        );
    } else {
        tracing::info!(
            attempts = attempts.attempt_count(),
            duration = ?attempts.duration(),
            "session ended without success"
        );
    }
}

impl<E> RetryStrategy<E> {
    /// Lazily attempt `action` under this strategy.
    pub fn run<F>(&self, action: F, token: &CancellationToken) -> BoxedAttempts<'static, (), E>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        repeatedly::run(action).using_strategy(self, token)
    }

    /// Lazily attempt `factory` under this strategy, using `default` as the
    /// value of failed attempts.
    pub fn get<F, T>(&self, factory: F, default: T, token: &CancellationToken) -> BoxedAttempts<'static, T, E>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        repeatedly::get(factory, default).using_strategy(self, token)
    }
}

#[cfg(test)]
mod tests;
