//! # Reattempt
//!
//! > *"Try, try again, but keep the receipts"*
//!
//! A Rust library for running fallible operations repeatedly under a retry
//! strategy, keeping a timed record of every attempt.
//!
//! ## Philosophy
//!
//! **Reattempt** separates *describing* a retry session from *running* it:
//! - **Sequences** = an infinite, lazy stream of deferred attempts
//! - **Operators** = iterator adapters that bound, delay and cut the stream
//! - **Executors** = the only place an attempt is actually forced
//!
//! Nothing runs until an executor pulls the next attempt, and attempts of the
//! same session never overlap.
//!
//! ## Quick Example
//!
//! ```rust
//! use reattempt::prelude::*;
//! use std::sync::atomic::{AtomicU32, Ordering::SeqCst};
//! use std::time::Duration;
//!
//! let strategy = RetryStrategy::new()
//!     .with_attempt_limit(4)
//!     .with_failure_delay(Duration::from_millis(1))
//!     .with_backoff(Backoff::Exponential)
//!     .throw_when(|err: &String| err.starts_with("fatal"));
//!
//! let remaining = AtomicU32::new(2);
//! let result = strategy
//!     .run(
//!         move || match remaining.fetch_update(SeqCst, SeqCst, |n| n.checked_sub(1)) {
//!             Ok(_) => Err("connection reset".to_string()),
//!             Err(_) => Ok(()),
//!         },
//!         &CancellationToken::new(),
//!     )
//!     .throw_if_cant_succeed(Some("could not sync"), None);
//!
//! match result {
//!     Ok(attempts) => {
//!         println!("succeeded after {} attempts", attempts.attempt_count());
//!     }
//!     Err(err) => {
//!         println!("gave up: {}", err);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`attempt`]: single timed invocations, deferred attempts and generators
//! - [`sequence`]: generic iterator operators (pairwise join, duration bound,
//!   cancellable delays)
//! - [`pipeline`]: attempt-specific operators and the executors
//! - [`strategy`]: declarative retry strategies and backoff
//! - [`session`] and [`config`]: reusable, configurable sessions
//! - `offload` (feature `async`): run a whole session on tokio's blocking pool

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod attempt;
pub mod cancel;
pub mod config;
pub mod error;
pub mod history;
#[cfg(feature = "async")]
pub mod offload;
pub mod pipeline;
pub mod sequence;
pub mod session;
pub mod strategy;
pub mod testing;

// Re-exports
pub use attempt::{repeatedly, Attempt, Deferred};
pub use cancel::CancellationToken;
pub use config::RetryConfig;
pub use error::{FailureCause, Propagated, RepeatedFailure, SessionError};
pub use history::Attempts;
pub use pipeline::{AttemptSequenceExt, BoxedAttempts};
pub use sequence::{Between, SequenceExt};
pub use session::Session;
pub use strategy::{Backoff, DelayAdjustment, ErrorPredicate, JitterStrategy, RetryStrategy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attempt::{repeatedly, Attempt, Deferred};
    pub use crate::cancel::CancellationToken;
    pub use crate::error::{Propagated, RepeatedFailure, SessionError};
    pub use crate::history::Attempts;
    pub use crate::pipeline::AttemptSequenceExt;
    pub use crate::sequence::SequenceExt;
    pub use crate::session::Session;
    pub use crate::strategy::{Backoff, DelayAdjustment, RetryStrategy};
}
