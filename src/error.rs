//! Error types raised by retry sessions.
//!
//! Per-attempt errors are captured in [`Attempt`](crate::Attempt)s and never
//! escape on their own. Only two things turn a captured error back into an
//! `Err`:
//!
//! - [`Propagated`]: a failed attempt matched a throw predicate (or failed a
//!   catch predicate) and ended the session immediately.
//! - [`RepeatedFailure`]: the caller asked for an error when the session ran
//!   out of attempts or time without succeeding.
//!
//! [`SessionError`] unifies both for
//! [`throw_if_cant_succeed`](crate::AttemptSequenceExt::throw_if_cant_succeed).

use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::attempt::{Attempt, Deferred};
use crate::history::Attempts;

/// A failed attempt whose error was selected to end the session.
///
/// # Examples
///
/// ```rust
/// use reattempt::prelude::*;
///
/// let result = repeatedly::run(|| Err::<(), _>("permission denied"))
///     .take(10)
///     .throw_where(|err: &&str| err.contains("denied"))
///     .execute(None);
///
/// let propagated = result.unwrap_err();
/// assert_eq!(propagated.error(), &"permission denied");
/// ```
pub struct Propagated<T, E> {
    attempt: Deferred<T, E>,
}

impl<T, E> Propagated<T, E> {
    pub(crate) fn new(attempt: Deferred<T, E>) -> Self {
        Self { attempt }
    }

    /// The attempt that ended the session.
    pub fn attempt(&self) -> &Attempt<T, E> {
        self.attempt.force()
    }

    /// The error that ended the session.
    pub fn error(&self) -> &E {
        self.attempt()
            .error()
            .expect("propagated attempts always carry an error")
    }

    /// Take ownership of the error.
    ///
    /// Fails if a custom sequence operator still holds a clone of the
    /// attempt; the executor itself never does once it has returned.
    pub fn into_error(self) -> Result<E, Self> {
        match self.attempt.try_into_attempt() {
            Ok(attempt) => Ok(attempt
                .into_error()
                .expect("propagated attempts always carry an error")),
            Err(attempt) => Err(Self { attempt }),
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for Propagated<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Propagated")
            .field("error", self.error())
            .field("duration", &self.attempt().duration())
            .finish()
    }
}

impl<T, E: fmt::Display> fmt::Display for Propagated<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error())
    }
}

impl<T, E: StdError + 'static> StdError for Propagated<T, E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.error())
    }
}

/// One underlying error of a [`RepeatedFailure`] with the timing of the
/// attempt that produced it.
#[derive(Debug, Clone, Copy)]
pub struct FailureCause<'a, E> {
    /// The error produced by the attempt.
    pub error: &'a E,
    /// When the attempt began.
    pub begin_time: SystemTime,
    /// When the attempt ended.
    pub end_time: SystemTime,
    /// How long the attempt ran.
    pub duration: Duration,
}

/// Aggregated failure of a session that never succeeded.
///
/// Carries every retained per-attempt error together with its timing, plus
/// the session's total attempt count and timing. The total count includes
/// attempts evicted from the bounded history.
///
/// # Examples
///
/// ```rust
/// use reattempt::prelude::*;
///
/// let failure = repeatedly::run(|| Err::<(), _>("timeout"))
///     .take(3)
///     .throw_if_cant_succeed(Some("upload failed"), None)
///     .unwrap_err()
///     .into_exhausted()
///     .unwrap();
///
/// assert_eq!(failure.message(), Some("upload failed"));
/// assert_eq!(failure.attempt_count(), 3);
/// assert_eq!(failure.causes().count(), 3);
/// ```
pub struct RepeatedFailure<T, E> {
    message: Option<String>,
    attempts: Attempts<T, E>,
}

impl<T, E> RepeatedFailure<T, E> {
    /// Build an aggregated failure from a completed history.
    pub fn new(message: Option<String>, attempts: Attempts<T, E>) -> Self {
        Self { message, attempts }
    }

    /// The caller-supplied message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Every retained error with its attempt's timing, oldest first.
    pub fn causes(&self) -> impl Iterator<Item = FailureCause<'_, E>> {
        self.attempts.iter().filter_map(|attempt| {
            attempt.error().map(|error| FailureCause {
                error,
                begin_time: attempt.begin_time(),
                end_time: attempt.end_time(),
                duration: attempt.duration(),
            })
        })
    }

    /// Total number of attempts made during the session.
    pub fn attempt_count(&self) -> usize {
        self.attempts.attempt_count()
    }

    /// When the session began.
    pub fn begin_time(&self) -> SystemTime {
        self.attempts.begin_time()
    }

    /// When the session ended.
    pub fn end_time(&self) -> SystemTime {
        self.attempts.end_time()
    }

    /// Duration of the whole session.
    pub fn duration(&self) -> Duration {
        self.attempts.duration()
    }

    /// The session's history.
    pub fn attempts(&self) -> &Attempts<T, E> {
        &self.attempts
    }

    /// Consume the failure, returning the session's history.
    pub fn into_attempts(self) -> Attempts<T, E> {
        self.attempts
    }
}

impl<T, E: fmt::Debug> fmt::Debug for RepeatedFailure<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatedFailure")
            .field("message", &self.message)
            .field("attempt_count", &self.attempt_count())
            .field("duration", &self.duration())
            .field("causes", &self.causes().collect::<Vec<_>>())
            .finish()
    }
}

impl<T, E: fmt::Display> fmt::Display for RepeatedFailure<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} attempts over {:?})",
            self.message().unwrap_or("operation did not succeed"),
            self.attempt_count(),
            self.duration()
        )?;
        for (index, cause) in self.causes().enumerate() {
            write!(f, "\n  [{}] {} ({:?})", index, cause.error, cause.duration)?;
        }
        Ok(())
    }
}

impl<T, E: StdError + 'static> StdError for RepeatedFailure<T, E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.causes()
            .next()
            .map(|cause| cause.error as &(dyn StdError + 'static))
    }
}

/// Why a session that was asked to succeed did not.
pub enum SessionError<T, E> {
    /// A failed attempt's error was propagated by a throw or catch predicate.
    Propagated(Propagated<T, E>),
    /// Every attempt failed, or the session was cut short before a success.
    Exhausted(RepeatedFailure<T, E>),
}

impl<T, E> SessionError<T, E> {
    /// Returns true if a predicate propagated an attempt's error.
    pub fn is_propagated(&self) -> bool {
        matches!(self, Self::Propagated(_))
    }

    /// Returns true if the session ran out of attempts or time.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// The propagated error, if any.
    pub fn into_propagated(self) -> Option<Propagated<T, E>> {
        match self {
            Self::Propagated(p) => Some(p),
            Self::Exhausted(_) => None,
        }
    }

    /// The aggregated failure, if any.
    pub fn into_exhausted(self) -> Option<RepeatedFailure<T, E>> {
        match self {
            Self::Exhausted(f) => Some(f),
            Self::Propagated(_) => None,
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for SessionError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagated(p) => f.debug_tuple("Propagated").field(p).finish(),
            Self::Exhausted(e) => f.debug_tuple("Exhausted").field(e).finish(),
        }
    }
}

impl<T, E> From<Propagated<T, E>> for SessionError<T, E> {
    fn from(propagated: Propagated<T, E>) -> Self {
        Self::Propagated(propagated)
    }
}

impl<T, E> From<RepeatedFailure<T, E>> for SessionError<T, E> {
    fn from(failure: RepeatedFailure<T, E>) -> Self {
        Self::Exhausted(failure)
    }
}

impl<T, E: fmt::Display> fmt::Display for SessionError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagated(p) => write!(f, "{}", p),
            Self::Exhausted(e) => write!(f, "{}", e),
        }
    }
}

impl<T, E: StdError + 'static> StdError for SessionError<T, E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Propagated(p) => p.source(),
            Self::Exhausted(e) => e.source(),
        }
    }
}
