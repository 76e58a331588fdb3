//! Retry strategies: declarative descriptions of how a session behaves.
//!
//! A [`RetryStrategy`] is just data plus a few pure functions. It never runs
//! anything itself; [`using_strategy`](crate::AttemptSequenceExt::using_strategy)
//! turns it into a pipeline of lazy operators over a generated attempt
//! sequence.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::{Backoff, RetryStrategy};
//! use std::time::Duration;
//!
//! let strategy: RetryStrategy<std::io::Error> = RetryStrategy::new()
//!     .with_attempt_limit(5)
//!     .with_failure_delay(Duration::from_millis(100))
//!     .with_backoff(Backoff::Exponential)
//!     .with_max_duration(Duration::from_secs(10))
//!     .throw_when(|err: &std::io::Error| err.kind() == std::io::ErrorKind::PermissionDenied);
//!
//! assert_eq!(strategy.attempt_limit(), Some(5));
//! assert!(strategy.validate().is_ok());
//! ```
//!
//! # Backoff
//!
//! The failure delay evolves through a [`DelayAdjustment`]: a pure
//! `Duration -> Duration` function applied to the *current* delay after each
//! failure, so successive adjustments compound. [`Backoff`] covers the common
//! shapes:
//!
//! - **Constant**: the delay never changes
//! - **Linear**: the delay grows by a fixed step (100ms, 150ms, 200ms, ...)
//! - **Exponential**: the delay doubles (100ms, 200ms, 400ms, ...)
//! - **Multiplicative**: the delay is scaled by an arbitrary factor
//!
//! Jitter is available through [`DelayAdjustment::with_jitter`] when the
//! `jitter` feature is enabled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A shareable predicate over an attempt's error.
pub type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A pure function from the current failure delay to the next one.
///
/// # Examples
///
/// ```rust
/// use reattempt::DelayAdjustment;
/// use std::time::Duration;
///
/// let backoff = DelayAdjustment::new(|d| d * 3).capped(Duration::from_secs(1));
///
/// assert_eq!(backoff.apply(Duration::from_millis(100)), Duration::from_millis(300));
/// assert_eq!(backoff.apply(Duration::from_millis(500)), Duration::from_secs(1));
/// ```
#[derive(Clone)]
pub struct DelayAdjustment {
    adjust: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
}

impl DelayAdjustment {
    /// Wrap an adjustment function.
    pub fn new<F>(adjust: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        Self {
            adjust: Arc::new(adjust),
        }
    }

    /// Build an adjustment from a function over milliseconds.
    ///
    /// Negative or non-finite results become `Duration::ZERO`.
    pub fn from_millis_fn<F>(adjust: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::new(move |delay| millis_to_duration(adjust(as_millis_f64(delay))))
    }

    /// Compute the next delay from the current one.
    pub fn apply(&self, delay: Duration) -> Duration {
        (self.adjust)(delay)
    }

    /// Never let the adjusted delay exceed `max`.
    pub fn capped(self, max: Duration) -> Self {
        Self::new(move |delay| self.apply(delay).min(max))
    }

    /// Apply `other` to the result of this adjustment.
    pub fn then(self, other: DelayAdjustment) -> Self {
        Self::new(move |delay| other.apply(self.apply(delay)))
    }

    /// Randomize each adjusted delay according to `jitter`.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, jitter is the
    /// identity.
    pub fn with_jitter(self, jitter: JitterStrategy) -> Self {
        Self::new(move |delay| jitter.apply(self.apply(delay)))
    }
}

impl fmt::Debug for DelayAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DelayAdjustment(<fn>)")
    }
}

impl From<Backoff> for DelayAdjustment {
    fn from(backoff: Backoff) -> Self {
        match backoff {
            Backoff::Constant => Self::new(|delay| delay),
            Backoff::Linear { step } => Self::new(move |delay| delay.saturating_add(step)),
            Backoff::Exponential => Self::new(|delay| delay.saturating_mul(2)),
            Backoff::Multiplicative { factor } => {
                Self::new(move |delay| scale(delay, factor))
            }
        }
    }
}

fn as_millis_f64(delay: Duration) -> f64 {
    delay.as_nanos() as f64 / 1_000_000.0
}

fn millis_to_duration(millis: f64) -> Duration {
    if !(millis.is_finite() && millis > 0.0) {
        return Duration::ZERO;
    }
    let nanos = (millis * 1_000_000.0).round();
    if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    millis_to_duration(as_millis_f64(delay) * factor)
}

/// Common shapes for evolving the failure delay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "kind"))]
pub enum Backoff {
    /// The delay never changes.
    #[default]
    Constant,
    /// The delay grows by `step` after each failure.
    Linear {
        /// Added to the delay after each failure.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        step: Duration,
    },
    /// The delay doubles after each failure.
    Exponential,
    /// The delay is multiplied by `factor` after each failure.
    Multiplicative {
        /// Scale applied to the delay after each failure.
        factor: f64,
    },
}

#[cfg(feature = "serde")]
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and the calculated delay.
    Full,
}

impl JitterStrategy {
    /// Apply jitter to a delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterStrategy::None => delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let factor = factor.clamp(0.0, 1.0);
                let millis = as_millis_f64(delay);
                let spread = millis * factor;
                let low = (millis - spread).max(0.0);
                let high = millis + spread;
                if high <= low {
                    delay
                } else {
                    millis_to_duration(rand::rng().random_range(low..=high))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = delay.as_millis().min(u128::from(u64::MAX)) as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => delay,
        }
    }
}

/// Declarative configuration for a retry session.
///
/// | Setting | Effect |
/// |---|---|
/// | `failure_delay` | wait after a failed attempt before the next one |
/// | `failure_delay_adjustment` | evolves the wait after each failure |
/// | `attempt_limit` | maximum number of attempts |
/// | `max_duration` | wall-clock budget, measured from the first attempt |
/// | `throw_predicate` | errors that end the session immediately |
/// | `catch_predicate` | errors that may be retried; any other error ends the session |
///
/// A zero attempt limit or zero max duration means "unbounded". Setting both
/// predicates is allowed: an error ends the session if either one asks for it.
pub struct RetryStrategy<E> {
    failure_delay: Duration,
    failure_delay_adjustment: Option<DelayAdjustment>,
    attempt_limit: Option<usize>,
    max_duration: Option<Duration>,
    throw_predicate: Option<ErrorPredicate<E>>,
    catch_predicate: Option<ErrorPredicate<E>>,
}

impl<E> RetryStrategy<E> {
    /// A strategy with no delay, no bounds and no predicates.
    pub fn new() -> Self {
        Self {
            failure_delay: Duration::ZERO,
            failure_delay_adjustment: None,
            attempt_limit: None,
            max_duration: None,
            throw_predicate: None,
            catch_predicate: None,
        }
    }

    /// Set the wait after a failed attempt.
    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Set how the failure delay evolves after each failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::RetryStrategy;
    /// use std::time::Duration;
    ///
    /// let strategy: RetryStrategy<String> = RetryStrategy::new()
    ///     .with_failure_delay(Duration::from_millis(10))
    ///     .with_delay_adjustment(|d| (d * 2).min(Duration::from_secs(1)));
    ///
    /// let adjust = strategy.failure_delay_adjustment().unwrap();
    /// assert_eq!(adjust.apply(Duration::from_millis(10)), Duration::from_millis(20));
    /// ```
    pub fn with_delay_adjustment<F>(mut self, adjust: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.failure_delay_adjustment = Some(DelayAdjustment::new(adjust));
        self
    }

    /// Evolve the failure delay with one of the built-in backoff shapes.
    pub fn with_backoff(mut self, backoff: impl Into<DelayAdjustment>) -> Self {
        self.failure_delay_adjustment = Some(backoff.into());
        self
    }

    /// Cap the number of attempts. Zero means unlimited.
    pub fn with_attempt_limit(mut self, limit: usize) -> Self {
        self.attempt_limit = (limit > 0).then_some(limit);
        self
    }

    /// Stop starting new attempts once `duration` has elapsed since the
    /// first one. An attempt that is already running is allowed to finish.
    /// Zero means unbounded.
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = (!duration.is_zero()).then_some(duration);
        self
    }

    /// End the session with the error of any failed attempt matching
    /// `predicate`.
    pub fn throw_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.throw_predicate = Some(Arc::new(predicate));
        self
    }

    /// Keep retrying only while failed attempts' errors match `predicate`;
    /// the first error that does not match ends the session.
    pub fn catch_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.catch_predicate = Some(Arc::new(predicate));
        self
    }

    /// The base wait after a failed attempt.
    pub fn failure_delay(&self) -> Duration {
        self.failure_delay
    }

    /// How the failure delay evolves.
    pub fn failure_delay_adjustment(&self) -> Option<&DelayAdjustment> {
        self.failure_delay_adjustment.as_ref()
    }

    /// The attempt cap.
    pub fn attempt_limit(&self) -> Option<usize> {
        self.attempt_limit
    }

    /// The wall-clock budget.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// The throw predicate.
    pub fn throw_predicate(&self) -> Option<&ErrorPredicate<E>> {
        self.throw_predicate.as_ref()
    }

    /// The catch predicate.
    pub fn catch_predicate(&self) -> Option<&ErrorPredicate<E>> {
        self.catch_predicate.as_ref()
    }

    /// True if an attempt limit or a max duration is set.
    pub fn is_bounded(&self) -> bool {
        self.attempt_limit.is_some() || self.max_duration.is_some()
    }

    /// Check that a session using this strategy cannot run forever.
    ///
    /// Unbounded strategies are legal but retry until the first success.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.is_bounded() {
            Ok(())
        } else {
            Err("RetryStrategy has no bound (attempt_limit or max_duration)")
        }
    }
}

impl<E> Default for RetryStrategy<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for RetryStrategy<E> {
    fn clone(&self) -> Self {
        Self {
            failure_delay: self.failure_delay,
            failure_delay_adjustment: self.failure_delay_adjustment.clone(),
            attempt_limit: self.attempt_limit,
            max_duration: self.max_duration,
            throw_predicate: self.throw_predicate.clone(),
            catch_predicate: self.catch_predicate.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryStrategy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryStrategy")
            .field("failure_delay", &self.failure_delay)
            .field("failure_delay_adjustment", &self.failure_delay_adjustment)
            .field("attempt_limit", &self.attempt_limit)
            .field("max_duration", &self.max_duration)
            .field("throw_predicate", &self.throw_predicate.is_some())
            .field("catch_predicate", &self.catch_predicate.is_some())
            .finish()
    }
}
