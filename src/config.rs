//! Declarative retry configuration.
//!
//! [`RetryConfig`] is the plain-data counterpart of [`RetryStrategy`]: every
//! duration is expressed in milliseconds and every field has a default, so
//! it can be loaded from configuration files with the `serde` feature.
//! Predicates cannot be expressed as data; attach them to the strategy
//! returned by [`RetryConfig::to_strategy`].
//!
//! # Examples
//!
//! ```rust
//! use reattempt::{Backoff, RetryConfig};
//! use std::time::Duration;
//!
//! let config = RetryConfig {
//!     attempt_limit: 5,
//!     failure_delay_ms: 100,
//!     backoff: Some(Backoff::Exponential),
//!     max_delay_ms: Some(1_000),
//!     ..RetryConfig::default()
//! };
//!
//! let strategy = config.to_strategy::<std::io::Error>();
//! assert_eq!(strategy.attempt_limit(), Some(5));
//! assert_eq!(strategy.failure_delay(), Duration::from_millis(100));
//! ```

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::strategy::{Backoff, DelayAdjustment, JitterStrategy, RetryStrategy};

/// Plain-data retry configuration.
///
/// Zero `attempt_limit` and zero `max_duration_ms` mean "unbounded".
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub attempt_limit: usize,
    /// Wall-clock budget for the session, in milliseconds.
    pub max_duration_ms: u64,
    /// Base wait after a failed attempt, in milliseconds.
    pub failure_delay_ms: u64,
    /// How the wait evolves after each failure.
    pub backoff: Option<Backoff>,
    /// Upper bound for the evolving wait, in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Randomness applied to each evolved wait.
    pub jitter: JitterStrategy,
    /// Maximum number of attempts kept in the session history.
    pub max_retained_attempts: Option<usize>,
    /// Message carried by the aggregated failure.
    pub message: Option<String>,
}

impl RetryConfig {
    /// The delay adjustment described by `backoff`, `max_delay_ms` and
    /// `jitter`, if any of them is set.
    pub fn delay_adjustment(&self) -> Option<DelayAdjustment> {
        if self.backoff.is_none() && self.max_delay_ms.is_none() && self.jitter == JitterStrategy::None
        {
            return None;
        }

        let mut adjustment = DelayAdjustment::from(self.backoff.unwrap_or_default());
        if let Some(max) = self.max_delay_ms {
            adjustment = adjustment.capped(Duration::from_millis(max));
        }
        if self.jitter != JitterStrategy::None {
            adjustment = adjustment.with_jitter(self.jitter);
        }
        Some(adjustment)
    }

    /// Build the strategy described by this configuration.
    pub fn to_strategy<E>(&self) -> RetryStrategy<E> {
        let strategy = RetryStrategy::new()
            .with_attempt_limit(self.attempt_limit)
            .with_max_duration(Duration::from_millis(self.max_duration_ms))
            .with_failure_delay(Duration::from_millis(self.failure_delay_ms));

        match self.delay_adjustment() {
            Some(adjustment) => strategy.with_backoff(adjustment),
            None => strategy,
        }
    }

    /// Build a session carrying the strategy, history cap and message.
    pub fn to_session<E>(&self) -> Session<E> {
        let mut session = Session::new(self.to_strategy());
        if let Some(max) = self.max_retained_attempts {
            session = session.retain(max);
        }
        if let Some(message) = &self.message {
            session = session.with_message(message.clone());
        }
        session
    }
}
