//! General-purpose lazy sequence operators.
//!
//! These adaptors work on any iterator; the attempt-specific operators in
//! [`crate::pipeline`] are built from them. All of them are lazy: nothing
//! happens until the consumer pulls the next element.
//!
//! - [`join_with`](SequenceExt::join_with): run a callback between every
//!   adjacent pair of elements.
//! - [`when`](SequenceExt::when): run an action on elements matching a
//!   predicate.
//! - [`take_for_duration`](SequenceExt::take_for_duration): stop pulling new
//!   elements once a wall-clock budget is spent.
//! - [`take_until_cancelled`](SequenceExt::take_until_cancelled): stop at the
//!   first iteration boundary after cancellation.
//! - [`delay_where`](SequenceExt::delay_where): wait between elements after
//!   one matching a predicate, with an adjustable delay.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::SequenceExt;
//!
//! let mut pairs = Vec::new();
//! let items: Vec<_> = (1..=4)
//!     .join_with(|prev: &i32, next: &i32| pairs.push((*prev, *next)))
//!     .collect();
//!
//! assert_eq!(items, vec![1, 2, 3, 4]);
//! assert_eq!(pairs, vec![(1, 2), (2, 3), (3, 4)]);
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::strategy::DelayAdjustment;

/// Callback invoked between adjacent elements by [`JoinWith`].
///
/// Any `FnMut(&T, &T)` closure is a `Between<T>` that never halts iteration.
/// Implementors returning `ControlFlow::Break` end the sequence before the
/// next element is yielded.
pub trait Between<T> {
    /// Called with the previous and next element, before `next` is yielded.
    fn between(&mut self, prev: &T, next: &T) -> ControlFlow<()>;
}

impl<T, F> Between<T> for F
where
    F: FnMut(&T, &T),
{
    fn between(&mut self, prev: &T, next: &T) -> ControlFlow<()> {
        self(prev, next);
        ControlFlow::Continue(())
    }
}

/// Invokes a callback between every adjacent pair of elements.
///
/// Created by [`SequenceExt::join_with`].
#[derive(Debug, Clone)]
pub struct JoinWith<I: Iterator, A> {
    inner: I,
    between: A,
    prev: Option<I::Item>,
    halted: bool,
}

impl<I, A> JoinWith<I, A>
where
    I: Iterator,
{
    pub(crate) fn new(inner: I, between: A) -> Self {
        Self {
            inner,
            between,
            prev: None,
            halted: false,
        }
    }
}

impl<I, A> Iterator for JoinWith<I, A>
where
    I: Iterator,
    I::Item: Clone,
    A: Between<I::Item>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        let next = self.inner.next()?;
        if let Some(prev) = self.prev.take() {
            if self.between.between(&prev, &next).is_break() {
                self.halted = true;
                return None;
            }
        }
        self.prev = Some(next.clone());
        Some(next)
    }
}

impl<I, A> FusedIterator for JoinWith<I, A>
where
    I: FusedIterator,
    I::Item: Clone,
    A: Between<I::Item>,
{
}

/// Runs an action on each element that satisfies a predicate.
///
/// Created by [`SequenceExt::when`].
#[derive(Debug, Clone)]
pub struct When<I, P, A> {
    inner: I,
    predicate: P,
    action: A,
}

impl<I, P, A> Iterator for When<I, P, A>
where
    I: Iterator,
    P: FnMut(&I::Item) -> bool,
    A: FnMut(&I::Item),
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        if (self.predicate)(&item) {
            (self.action)(&item);
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Stops yielding once a wall-clock budget is spent or cancellation is
/// requested.
///
/// The clock starts when the first element is pulled. The budget is checked
/// before each pull and again once the pull returns, so an element produced
/// after the budget ran out (for instance behind an upstream delay) is
/// discarded. An element already handed out, and an operation already
/// running, is never interrupted; only new elements are withheld.
///
/// Created by [`SequenceExt::take_for_duration`].
#[derive(Debug, Clone)]
pub struct TakeForDuration<I> {
    inner: I,
    budget: Duration,
    started: Option<Instant>,
    token: CancellationToken,
    done: bool,
}

impl<I: Iterator> Iterator for TakeForDuration<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        if self.token.is_cancelled() || started.elapsed() > self.budget {
            self.done = true;
            return None;
        }
        let item = self.inner.next();
        if item.is_none() || self.token.is_cancelled() || started.elapsed() > self.budget {
            self.done = true;
            return None;
        }
        item
    }
}

impl<I: Iterator> FusedIterator for TakeForDuration<I> {}

/// Stops yielding at the first iteration boundary after cancellation.
///
/// Created by [`SequenceExt::take_until_cancelled`].
#[derive(Debug, Clone)]
pub struct TakeUntilCancelled<I> {
    inner: I,
    token: CancellationToken,
    done: bool,
}

impl<I: Iterator> Iterator for TakeUntilCancelled<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.token.is_cancelled() {
            self.done = true;
            return None;
        }
        let item = self.inner.next();
        self.done = item.is_none();
        item
    }
}

impl<I: Iterator> FusedIterator for TakeUntilCancelled<I> {}

/// Waits between elements when the previous element matched a predicate.
///
/// The wait observes the cancellation token; an interrupted wait ends the
/// sequence without yielding the pending element. After every matching
/// element the delay is advanced by the adjustment, so adjustments compound.
#[derive(Debug, Clone)]
pub struct Delayer<P> {
    predicate: P,
    delay: Duration,
    adjustment: Option<DelayAdjustment>,
    token: CancellationToken,
}

impl<P> Delayer<P> {
    /// The delay that will be applied after the next matching element.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }
}

impl<T, P> Between<T> for Delayer<P>
where
    P: FnMut(&T) -> bool,
{
    fn between(&mut self, prev: &T, _next: &T) -> ControlFlow<()> {
        if !(self.predicate)(prev) {
            return ControlFlow::Continue(());
        }

        if !self.delay.is_zero() {
            #[cfg(feature = "tracing")]
            tracing::trace!(delay = ?self.delay, "waiting before next attempt");

            if self.token.wait_timeout(self.delay) {
                #[cfg(feature = "tracing")]
                tracing::debug!("delay interrupted by cancellation");
                return ControlFlow::Break(());
            }
        }

        if let Some(adjustment) = &self.adjustment {
            self.delay = adjustment.apply(self.delay);
        }
        ControlFlow::Continue(())
    }
}

/// Delays iteration after elements that satisfy a predicate.
///
/// Created by [`SequenceExt::delay_where`].
pub struct DelayWhere<I: Iterator, P> {
    inner: JoinWith<I, Delayer<P>>,
    token: CancellationToken,
}

impl<I, P> fmt::Debug for DelayWhere<I, P>
where
    I: Iterator + fmt::Debug,
    I::Item: fmt::Debug,
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayWhere")
            .field("inner", &self.inner)
            .field("token", &self.token)
            .finish()
    }
}

impl<I, P> Clone for DelayWhere<I, P>
where
    I: Iterator + Clone,
    I::Item: Clone,
    P: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            token: self.token.clone(),
        }
    }
}

impl<I: Iterator, P> DelayWhere<I, P> {
    /// The delay that will be applied after the next matching element.
    pub fn current_delay(&self) -> Duration {
        self.inner.between.current_delay()
    }
}

impl<I, P> Iterator for DelayWhere<I, P>
where
    I: Iterator,
    I::Item: Clone,
    P: FnMut(&I::Item) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.token.is_cancelled() {
            return None;
        }
        self.inner.next()
    }
}

/// Extension methods adding the lazy operators to every iterator.
pub trait SequenceExt: Iterator + Sized {
    /// Invoke `between` with the previous and next element each time a new
    /// element is pulled, before it is yielded.
    fn join_with<A>(self, between: A) -> JoinWith<Self, A>
    where
        Self::Item: Clone,
        A: Between<Self::Item>,
    {
        JoinWith::new(self, between)
    }

    /// Invoke `action` on each element satisfying `predicate`.
    fn when<P, A>(self, predicate: P, action: A) -> When<Self, P, A>
    where
        P: FnMut(&Self::Item) -> bool,
        A: FnMut(&Self::Item),
    {
        When {
            inner: self,
            predicate,
            action,
        }
    }

    /// Stop pulling new elements once `budget` has elapsed since the first
    /// pull, or once `token` is cancelled. An element whose pull finishes
    /// past the budget is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::{CancellationToken, SequenceExt};
    /// use std::time::Duration;
    ///
    /// let ticks = std::iter::repeat(())
    ///     .inspect(|_| std::thread::sleep(Duration::from_millis(5)))
    ///     .take_for_duration(Duration::from_millis(30), &CancellationToken::new())
    ///     .count();
    ///
    /// assert!(ticks >= 1 && ticks < 100);
    /// ```
    fn take_for_duration(self, budget: Duration, token: &CancellationToken) -> TakeForDuration<Self> {
        TakeForDuration {
            inner: self,
            budget,
            started: None,
            token: token.clone(),
            done: false,
        }
    }

    /// Stop at the first iteration boundary after `token` is cancelled.
    fn take_until_cancelled(self, token: &CancellationToken) -> TakeUntilCancelled<Self> {
        TakeUntilCancelled {
            inner: self,
            token: token.clone(),
            done: false,
        }
    }

    /// Wait `delay` between elements whenever the previous element satisfies
    /// `predicate`, advancing the delay by `adjustment` after each such wait.
    ///
    /// Cancelling `token` interrupts a wait and ends the sequence.
    fn delay_where<P>(
        self,
        predicate: P,
        delay: Duration,
        adjustment: Option<DelayAdjustment>,
        token: &CancellationToken,
    ) -> DelayWhere<Self, P>
    where
        Self::Item: Clone,
        P: FnMut(&Self::Item) -> bool,
    {
        let delayer = Delayer {
            predicate,
            delay,
            adjustment,
            token: token.clone(),
        };
        DelayWhere {
            inner: JoinWith::new(self, delayer),
            token: token.clone(),
        }
    }
}

impl<I: Iterator> SequenceExt for I {}
