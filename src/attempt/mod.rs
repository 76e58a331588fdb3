//! Timed outcome records for single invocations of an operation.
//!
//! An [`Attempt`] captures one execution of a user operation: when it began,
//! when it ended, the fault it produced (if any) and the value it produced (or
//! the caller's default when it failed). Attempts are plain data and never
//! change after construction.
//!
//! # Examples
//!
//! ```rust
//! use reattempt::Attempt;
//!
//! let ok = Attempt::get(|| "42".parse::<i32>(), 0);
//! assert!(ok.succeeded());
//! assert_eq!(*ok.value(), 42);
//!
//! let failed = Attempt::get(|| "forty-two".parse::<i32>(), -1);
//! assert!(!failed.succeeded());
//! assert_eq!(*failed.value(), -1);
//! assert!(failed.error().is_some());
//! ```
//!
//! Lazily evaluated attempts live in [`Deferred`], and the infinite generator
//! producing them lives in [`repeatedly`].

mod deferred;
pub mod repeatedly;

pub use deferred::Deferred;

use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

/// The outcome of invoking an operation once.
///
/// `succeeded()` is always the negation of "an error is present". For
/// side-effecting actions `T` is `()`.
#[derive(Debug, Clone)]
pub struct Attempt<T, E> {
    begin: SystemTime,
    end: SystemTime,
    duration: OnceLock<Duration>,
    value: T,
    error: Option<E>,
}

impl<T, E> Attempt<T, E> {
    /// Record an attempt that began at `begin` and ends now.
    ///
    /// `value` is the produced value, or the caller's default when `error`
    /// is present.
    pub fn new(begin: SystemTime, value: T, error: Option<E>) -> Self {
        Self {
            begin,
            end: SystemTime::now(),
            duration: OnceLock::new(),
            value,
            error,
        }
    }

    /// Invoke `factory`, recording its value or capturing its error.
    ///
    /// When the factory fails the attempt carries `default` as its value.
    pub fn get<F>(factory: F, default: T) -> Self
    where
        F: FnOnce() -> Result<T, E>,
    {
        let begin = SystemTime::now();
        match factory() {
            Ok(value) => Self::new(begin, value, None),
            Err(error) => Self::new(begin, default, Some(error)),
        }
    }

    /// Invoke `factory`, falling back to `T::default()` when it fails.
    pub fn get_or_default<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<T, E>,
        T: Default,
    {
        Self::get(factory, T::default())
    }

    /// True if no error was produced.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// The error produced by the operation, if any.
    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// The produced value, or the default supplied for a failed attempt.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the operation was invoked.
    pub fn begin_time(&self) -> SystemTime {
        self.begin
    }

    /// When the operation returned.
    pub fn end_time(&self) -> SystemTime {
        self.end
    }

    /// How long the operation ran.
    ///
    /// Computed on first access and cached afterwards. A clock that stepped
    /// backwards during the attempt yields `Duration::ZERO`.
    pub fn duration(&self) -> Duration {
        *self
            .duration
            .get_or_init(|| self.end.duration_since(self.begin).unwrap_or_default())
    }

    /// Consume the attempt, returning its value (or default).
    pub fn into_value(self) -> T {
        self.value
    }

    /// Consume the attempt, returning its error if it failed.
    pub fn into_error(self) -> Option<E> {
        self.error
    }

    /// Convert into a `Result`, discarding timing information.
    ///
    /// The default value of a failed attempt is dropped.
    pub fn into_result(self) -> Result<T, E> {
        match self.error {
            None => Ok(self.value),
            Some(error) => Err(error),
        }
    }
}

impl<E> Attempt<(), E> {
    /// Invoke a side-effecting `action`, capturing its error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::Attempt;
    ///
    /// let attempt = Attempt::run(|| Err::<(), _>("disk full"));
    /// assert!(!attempt.succeeded());
    /// assert_eq!(attempt.error(), Some(&"disk full"));
    /// ```
    pub fn run<F>(action: F) -> Self
    where
        F: FnOnce() -> Result<(), E>,
    {
        Self::get(action, ())
    }
}
