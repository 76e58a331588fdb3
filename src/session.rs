//! Reusable retry sessions.
//!
//! A [`Session`] bundles everything a call site needs to run an operation
//! under a retry strategy: the [`RetryStrategy`] itself, the
//! [`CancellationToken`] that interrupts failure delays, the retained-history
//! cap and the message used when the session fails. It is plain data and can
//! be cloned and shared between call sites.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::{RetryStrategy, Session};
//! use std::time::Duration;
//!
//! let session = Session::new(
//!     RetryStrategy::new()
//!         .with_attempt_limit(3)
//!         .with_failure_delay(Duration::from_millis(1)),
//! )
//! .with_message("could not reach the server");
//!
//! let err = session.run_or_fail(|| Err::<(), _>("connection refused")).unwrap_err();
//! assert!(err.to_string().starts_with("could not reach the server (3 attempts"));
//! ```

use crate::cancel::CancellationToken;
use crate::error::{Propagated, SessionError};
use crate::history::Attempts;
use crate::pipeline::AttemptSequenceExt;
use crate::strategy::RetryStrategy;

/// A retry strategy bound to a cancellation token, a history cap and a
/// failure message.
///
/// Clones share the cancellation token.
#[derive(Debug)]
pub struct Session<E> {
    strategy: RetryStrategy<E>,
    token: CancellationToken,
    max_retained: Option<usize>,
    message: Option<String>,
}

impl<E> Session<E> {
    /// Create a session with a fresh token, unbounded history and no message.
    pub fn new(strategy: RetryStrategy<E>) -> Self {
        Self {
            strategy,
            token: CancellationToken::new(),
            max_retained: None,
            message: None,
        }
    }

    /// Use `token` to interrupt failure delays.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Keep at most `max_retained` attempts in the returned history. Values
    /// below one are treated as one.
    pub fn retain(mut self, max_retained: usize) -> Self {
        self.max_retained = Some(max_retained);
        self
    }

    /// Message carried by the aggregated failure.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The session's strategy.
    pub fn strategy(&self) -> &RetryStrategy<E> {
        &self.strategy
    }

    /// The session's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The retained-history cap.
    pub fn max_retained(&self) -> Option<usize> {
        self.max_retained
    }

    /// The failure message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Cancel the session's token.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl<E> Session<E>
where
    E: Send + Sync + 'static,
{
    /// Run `action` until it succeeds or the strategy gives up.
    pub fn run<F>(&self, action: F) -> Result<Attempts<(), E>, Propagated<(), E>>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        self.strategy
            .run(action, &self.token)
            .execute(self.max_retained)
    }

    /// Run `factory` until it succeeds or the strategy gives up.
    pub fn get<F, T>(&self, factory: F, default: T) -> Result<Attempts<T, E>, Propagated<T, E>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        self.strategy
            .get(factory, default, &self.token)
            .execute(self.max_retained)
    }

    /// Like [`run`](Session::run), but fail when no attempt succeeded.
    pub fn run_or_fail<F>(&self, action: F) -> Result<Attempts<(), E>, SessionError<(), E>>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        self.strategy
            .run(action, &self.token)
            .throw_if_cant_succeed(self.message(), self.max_retained)
    }

    /// Like [`get`](Session::get), but fail when no attempt succeeded.
    pub fn get_or_fail<F, T>(
        &self,
        factory: F,
        default: T,
    ) -> Result<Attempts<T, E>, SessionError<T, E>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        self.strategy
            .get(factory, default, &self.token)
            .throw_if_cant_succeed(self.message(), self.max_retained)
    }

    /// The first successful value of `factory`, or `default`.
    pub fn value_or_default<F, T>(&self, factory: F, default: T) -> Result<T, Propagated<T, E>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Clone + Default + Send + Sync + 'static,
    {
        self.strategy
            .get(factory, default, &self.token)
            .value_or_default()
    }
}

#[cfg(feature = "async")]
impl<E> Session<E>
where
    E: Send + Sync + 'static,
{
    /// [`run`](Session::run) on tokio's blocking pool.
    pub async fn run_async<F>(&self, action: F) -> Result<Attempts<(), E>, Propagated<(), E>>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        crate::offload::execute(self.strategy.run(action, &self.token), self.max_retained).await
    }

    /// [`get`](Session::get) on tokio's blocking pool.
    pub async fn get_async<F, T>(
        &self,
        factory: F,
        default: T,
    ) -> Result<Attempts<T, E>, Propagated<T, E>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        crate::offload::execute(
            self.strategy.get(factory, default, &self.token),
            self.max_retained,
        )
        .await
    }

    /// [`run_or_fail`](Session::run_or_fail) on tokio's blocking pool.
    pub async fn run_or_fail_async<F>(
        &self,
        action: F,
    ) -> Result<Attempts<(), E>, SessionError<(), E>>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        crate::offload::throw_if_cant_succeed(
            self.strategy.run(action, &self.token),
            self.message.clone(),
            self.max_retained,
        )
        .await
    }
}

impl<E> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
            token: self.token.clone(),
            max_retained: self.max_retained,
            message: self.message.clone(),
        }
    }
}

impl<E> From<RetryStrategy<E>> for Session<E> {
    fn from(strategy: RetryStrategy<E>) -> Self {
        Self::new(strategy)
    }
}

impl<E> Default for Session<E> {
    fn default() -> Self {
        Self::new(RetryStrategy::new())
    }
}
