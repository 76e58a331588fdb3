//! Background offload of whole retry sessions.
//!
//! Attempts and failure delays are blocking by nature, so each entry point
//! here moves the entire sequential session onto tokio's blocking pool with
//! [`tokio::task::spawn_blocking`] and awaits its outcome. Attempts still run
//! one at a time on that worker.
//!
//! A panic inside an attempt is re-raised on the awaiting task.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::prelude::*;
//! use reattempt::offload;
//!
//! # tokio_test::block_on(async {
//! let attempts = repeatedly::run(|| Ok::<(), String>(())).take(3);
//! let history = offload::execute(attempts, None).await.unwrap();
//! assert!(history.succeeded());
//! # });
//! ```

use std::panic;

use tokio::task::JoinError;

use crate::attempt::{Attempt, Deferred};
use crate::error::{Propagated, SessionError};
use crate::history::Attempts;
use crate::pipeline::AttemptSequenceExt;

fn unwrap_join<R>(joined: Result<R, JoinError>) -> R {
    match joined {
        Ok(output) => output,
        Err(err) => match err.try_into_panic() {
            Ok(payload) => panic::resume_unwind(payload),
            // Blocking tasks are only cancelled when the runtime shuts down.
            Err(err) => panic!("offloaded retry session did not complete: {}", err),
        },
    }
}

/// Capture a single invocation of `action` on the blocking pool.
pub async fn attempt_run<F, E>(action: F) -> Attempt<(), E>
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: Send + 'static,
{
    unwrap_join(tokio::task::spawn_blocking(move || Attempt::run(action)).await)
}

/// Capture a single invocation of `factory` on the blocking pool.
pub async fn attempt_get<F, T, E>(factory: F, default: T) -> Attempt<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    unwrap_join(tokio::task::spawn_blocking(move || Attempt::get(factory, default)).await)
}

/// Run [`execute`](AttemptSequenceExt::execute) on the blocking pool.
pub async fn execute<I, T, E>(
    attempts: I,
    max_retained: Option<usize>,
) -> Result<Attempts<T, E>, Propagated<T, E>>
where
    I: Iterator<Item = Deferred<T, E>> + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    unwrap_join(tokio::task::spawn_blocking(move || attempts.execute(max_retained)).await)
}

/// Run [`throw_if_cant_succeed`](AttemptSequenceExt::throw_if_cant_succeed)
/// on the blocking pool.
pub async fn throw_if_cant_succeed<I, T, E>(
    attempts: I,
    message: Option<String>,
    max_retained: Option<usize>,
) -> Result<Attempts<T, E>, SessionError<T, E>>
where
    I: Iterator<Item = Deferred<T, E>> + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    unwrap_join(
        tokio::task::spawn_blocking(move || {
            attempts.throw_if_cant_succeed(message.as_deref(), max_retained)
        })
        .await,
    )
}

/// Run [`value_or_default`](AttemptSequenceExt::value_or_default) on the
/// blocking pool.
pub async fn value_or_default<I, T, E>(attempts: I) -> Result<T, Propagated<T, E>>
where
    I: Iterator<Item = Deferred<T, E>> + Send + 'static,
    T: Clone + Default + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    unwrap_join(tokio::task::spawn_blocking(move || attempts.value_or_default()).await)
}
