//! Session-level tests for the attempt pipeline.

use super::*;
use crate::attempt::Attempt;
use crate::strategy::Backoff;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Transient,
    Permanent,
}

/// An action failing `failures` times with `error`, then succeeding.
fn flaky(
    calls: &Arc<AtomicU32>,
    failures: u32,
    error: TestError,
) -> impl Fn() -> Result<(), TestError> + Send + Sync + 'static {
    let calls = calls.clone();
    move || {
        if calls.fetch_add(1, Ordering::SeqCst) < failures {
            Err(error.clone())
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_attempt_limit_counts_every_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::run(flaky(&calls, u32::MAX, TestError::Transient))
        .take(4)
        .execute(None)
        .unwrap();

    assert_eq!(attempts.len(), 4);
    assert_eq!(attempts.attempt_count(), 4);
    assert!(!attempts.succeeded());
    assert!(attempts.success().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_stops_at_first_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::run(flaky(&calls, 2, TestError::Transient))
        .take(10)
        .execute(None)
        .unwrap();

    assert!(attempts.succeeded());
    assert_eq!(attempts.attempt_count(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_unforced_elements_never_run() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::run(flaky(&calls, 0, TestError::Transient))
        .execute(None)
        .unwrap();

    // The generator is infinite; only the first attempt may run.
    assert!(attempts.succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_history_eviction_keeps_true_count() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::get(
        {
            let calls = calls.clone();
            move || Err::<u32, _>(calls.fetch_add(1, Ordering::SeqCst))
        },
        0,
    )
    .take(5)
    .execute(Some(2))
    .unwrap();

    assert_eq!(attempts.attempt_count(), 5);
    assert_eq!(attempts.len(), 2);
    let errors: Vec<u32> = attempts.iter().map(|a| *a.error().unwrap()).collect();
    assert_eq!(errors, vec![3, 4]);
}

#[test]
fn test_empty_sequence_is_not_successful() {
    let attempts = repeatedly::run(|| Ok::<_, TestError>(()))
        .take(0)
        .execute(None)
        .unwrap();
    assert!(attempts.is_empty());
    assert!(!attempts.succeeded());
}

#[test]
fn test_throw_where_propagates_first_match() {
    let calls = Arc::new(AtomicU32::new(0));
    let result = repeatedly::run(flaky(&calls, u32::MAX, TestError::Permanent))
        .take(10)
        .throw_where(|err| *err == TestError::Permanent)
        .execute(None);

    let propagated = result.unwrap_err();
    assert_eq!(propagated.error(), &TestError::Permanent);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(propagated.into_error().unwrap(), TestError::Permanent);
}

#[test]
fn test_throw_where_ignores_non_matching() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::run(flaky(&calls, 2, TestError::Transient))
        .take(10)
        .throw_where(|err| *err == TestError::Permanent)
        .execute(None)
        .unwrap();

    assert!(attempts.succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_catch_where_propagates_first_non_match() {
    let calls = Arc::new(AtomicU32::new(0));
    let errors = Arc::new(Mutex::new(vec![
        TestError::Transient,
        TestError::Transient,
        TestError::Permanent,
    ]));

    let result = repeatedly::run({
        let calls = calls.clone();
        let errors = errors.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(errors.lock().unwrap().remove(0))
        }
    })
    .take(10)
    .catch_where(|err| *err == TestError::Transient)
    .execute(None);

    assert_eq!(result.unwrap_err().error(), &TestError::Permanent);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_propagation_never_delays() {
    let token = CancellationToken::new();
    let start = Instant::now();
    let result = repeatedly::run(|| Err::<(), _>(TestError::Permanent))
        .take(3)
        .delay_where_failed(Duration::from_secs(5), None, &token)
        .throw_where(|_| true)
        .execute(None);

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_value_or_default_returns_first_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let value = repeatedly::get(
        {
            let calls = calls.clone();
            move || match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(TestError::Transient),
                n => Ok(n * 10),
            }
        },
        7,
    )
    .take(5)
    .value_or_default()
    .unwrap();

    assert_eq!(value, 20);
}

#[test]
fn test_value_or_default_falls_back_to_last_default() {
    let value = repeatedly::get(|| Err::<u32, _>(TestError::Transient), 99)
        .take(3)
        .value_or_default()
        .unwrap();
    assert_eq!(value, 99);

    let empty = repeatedly::get(|| Ok::<u32, TestError>(5), 99)
        .take(0)
        .value_or_default()
        .unwrap();
    assert_eq!(empty, 0);
}

#[test]
fn test_value_or_default_propagates() {
    let result = repeatedly::get(|| Err::<u32, _>(TestError::Permanent), 1)
        .take(3)
        .throw_where(|_| true)
        .value_or_default();
    assert_eq!(result.unwrap_err().error(), &TestError::Permanent);
}

#[test]
fn test_throw_if_cant_succeed_aggregates_all_causes() {
    let result = repeatedly::run(|| Err::<(), _>(TestError::Transient))
        .take(3)
        .throw_if_cant_succeed(Some("could not upload"), None);

    let failure = result.unwrap_err().into_exhausted().unwrap();
    assert_eq!(failure.message(), Some("could not upload"));
    assert_eq!(failure.attempt_count(), 3);
    let causes: Vec<_> = failure.causes().collect();
    assert_eq!(causes.len(), 3);
    for cause in &causes {
        assert_eq!(cause.error, &TestError::Transient);
        assert!(cause.end_time >= cause.begin_time);
    }
    assert!(failure.end_time() >= failure.begin_time());
}

#[test]
fn test_throw_if_cant_succeed_passes_success_through() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = repeatedly::run(flaky(&calls, 1, TestError::Transient))
        .take(3)
        .throw_if_cant_succeed(None, None)
        .unwrap();
    assert!(attempts.succeeded());
    assert_eq!(attempts.attempt_count(), 2);
}

#[test]
fn test_throw_if_cant_succeed_reports_propagation() {
    let result = repeatedly::run(|| Err::<(), _>(TestError::Permanent))
        .take(3)
        .throw_where(|_| true)
        .throw_if_cant_succeed(None, None);
    assert!(result.unwrap_err().is_propagated());
}

#[test]
fn test_strategy_attempt_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::new().with_attempt_limit(3);
    let attempts = strategy
        .run(flaky(&calls, u32::MAX, TestError::Transient), &CancellationToken::new())
        .execute(None)
        .unwrap();
    assert_eq!(attempts.attempt_count(), 3);
    assert!(!attempts.succeeded());
}

#[test]
fn test_strategy_throw_predicate_ignores_attempt_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::new()
        .with_attempt_limit(50)
        .throw_when(|err: &TestError| *err == TestError::Permanent);
    let result = strategy
        .run(flaky(&calls, u32::MAX, TestError::Permanent), &CancellationToken::new())
        .execute(None);
    assert_eq!(result.unwrap_err().error(), &TestError::Permanent);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_strategy_catch_predicate() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::new()
        .with_attempt_limit(50)
        .catch_when(|err: &TestError| *err == TestError::Transient);

    let result = strategy
        .run(flaky(&calls, u32::MAX, TestError::Permanent), &CancellationToken::new())
        .execute(None);
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = Arc::new(AtomicU32::new(0));
    let attempts = strategy
        .run(flaky(&calls, 3, TestError::Transient), &CancellationToken::new())
        .execute(None)
        .unwrap();
    assert!(attempts.succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_strategy_combined_predicates_union() {
    let strategy = RetryStrategy::new()
        .with_attempt_limit(10)
        .throw_when(|err: &u32| *err == 1)
        .catch_when(|err: &u32| *err < 5);

    let counter = Arc::new(AtomicU32::new(3));
    let result = strategy
        .run(
            {
                let counter = counter.clone();
                move || Err(counter.fetch_add(1, Ordering::SeqCst))
            },
            &CancellationToken::new(),
        )
        .execute(None);

    // 3 and 4 are caught, 5 escapes the catch predicate.
    assert_eq!(result.unwrap_err().error(), &5);
}

#[test]
fn test_strategy_duration_bound_precedes_attempt_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::new()
        .with_attempt_limit(1_000)
        .with_max_duration(Duration::from_millis(60))
        .with_failure_delay(Duration::from_millis(10));

    let start = Instant::now();
    let attempts = strategy
        .run(
            {
                let calls = calls.clone();
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    Err(TestError::Transient)
                }
            },
            &CancellationToken::new(),
        )
        .execute(None)
        .unwrap();

    let made = calls.load(Ordering::SeqCst) as usize;
    assert!(!attempts.succeeded());
    assert_eq!(attempts.attempt_count(), made);
    assert!(made >= 2 && made < 1_000, "made {} attempts", made);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_strategy_duration_bound_lets_running_attempt_finish() {
    let strategy = RetryStrategy::new().with_max_duration(Duration::from_millis(10));
    let attempts = strategy
        .run(
            || {
                std::thread::sleep(Duration::from_millis(40));
                Err(TestError::Transient)
            },
            &CancellationToken::new(),
        )
        .execute(None)
        .unwrap();

    // The first attempt overruns the budget but completes; no second starts.
    assert_eq!(attempts.attempt_count(), 1);
    assert!(attempts.last().unwrap().duration() >= Duration::from_millis(40));
}

#[test]
fn test_strategy_delay_crossing_duration_bound_starts_no_attempt() {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let strategy = RetryStrategy::new()
        .with_max_duration(Duration::from_millis(50))
        .with_failure_delay(Duration::from_millis(200));

    let attempts = strategy
        .run(
            {
                let starts = starts.clone();
                move || {
                    starts.lock().unwrap().push(Instant::now());
                    Err(TestError::Transient)
                }
            },
            &CancellationToken::new(),
        )
        .execute(None)
        .unwrap();

    assert_eq!(attempts.attempt_count(), 1);
    assert_eq!(starts.lock().unwrap().len(), 1);
    assert!(attempts.duration() >= Duration::from_millis(200));
}

#[test]
fn test_strategy_backoff_compounds() {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let strategy = RetryStrategy::new()
        .with_attempt_limit(3)
        .with_failure_delay(Duration::from_millis(20))
        .with_backoff(Backoff::Exponential);

    strategy
        .run(
            {
                let starts = starts.clone();
                move || {
                    starts.lock().unwrap().push(Instant::now());
                    Err(TestError::Transient)
                }
            },
            &CancellationToken::new(),
        )
        .execute(None)
        .unwrap();

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 3);
    let first_gap = starts[1] - starts[0];
    let second_gap = starts[2] - starts[1];
    assert!(first_gap >= Duration::from_millis(20));
    // The wait before the third attempt is twice the base delay.
    assert!(second_gap >= Duration::from_millis(40));
}

#[test]
fn test_delay_adjustment_advances_per_failure() {
    let token = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let adjustment = {
        let seen = seen.clone();
        DelayAdjustment::new(move |d| {
            seen.lock().unwrap().push(d);
            d * 2
        })
    };

    let attempts = repeatedly::run(|| Err::<(), _>(TestError::Transient))
        .take(4)
        .delay_where_failed(Duration::from_millis(1), Some(adjustment), &token)
        .execute(None)
        .unwrap();

    assert_eq!(attempts.attempt_count(), 4);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4)
        ]
    );
}

#[test]
fn test_no_delay_after_success() {
    let token = CancellationToken::new();
    let start = Instant::now();
    let attempts = repeatedly::run(|| Ok::<_, TestError>(()))
        .take(3)
        .delay_where_failed(Duration::from_secs(5), None, &token)
        .execute(None)
        .unwrap();
    assert!(attempts.succeeded());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_cancellation_during_delay_ends_without_error() {
    let token = CancellationToken::new();
    let remote = token.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        remote.cancel();
    });

    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::new()
        .with_attempt_limit(10)
        .with_failure_delay(Duration::from_secs(30));

    let start = Instant::now();
    let attempts = strategy
        .run(flaky(&calls, u32::MAX, TestError::Transient), &token)
        .execute(None)
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(attempts.attempt_count(), 1);
    assert_eq!(
        attempts.succeeded(),
        attempts.last().map(Attempt::succeeded).unwrap_or(false)
    );
    assert!(!attempts.succeeded());
    canceller.join().unwrap();
}

#[test]
fn test_cancellation_before_start_makes_no_attempts() {
    let token = CancellationToken::new();
    token.cancel();
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = RetryStrategy::new()
        .run(flaky(&calls, 0, TestError::Transient), &token)
        .execute(None)
        .unwrap();
    assert!(attempts.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancellation_does_not_abort_running_attempt() {
    let token = CancellationToken::new();
    let attempts = RetryStrategy::new()
        .with_attempt_limit(5)
        .run(
            {
                let token = token.clone();
                move || {
                    token.cancel();
                    Ok::<_, TestError>(())
                }
            },
            &token,
        )
        .execute(None)
        .unwrap();

    assert!(attempts.succeeded());
    assert_eq!(attempts.attempt_count(), 1);
}

#[test]
fn test_delay_where_failed_is_debug() {
    let token = CancellationToken::new();
    let delayed = repeatedly::run(|| Err::<(), _>(TestError::Transient))
        .take(2)
        .delay_where_failed(Duration::from_millis(1), None, &token);
    assert!(format!("{:?}", delayed).starts_with("DelayWhere"));
}

#[test]
fn test_strategy_get_produces_values() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = RetryStrategy::new()
        .with_attempt_limit(5)
        .get(
            {
                let calls = calls.clone();
                move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 1 {
                        Err(TestError::Transient)
                    } else {
                        Ok(format!("payload-{}", n))
                    }
                }
            },
            String::from("none"),
            &CancellationToken::new(),
        )
        .execute(None)
        .unwrap();

    let values: Vec<&str> = attempts.iter().map(|a| a.value().as_str()).collect();
    assert_eq!(values, vec!["none", "payload-1"]);
    assert_eq!(attempts.success().unwrap().value(), "payload-1");
}

#[test]
fn test_unbounded_strategy_runs_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let attempts = RetryStrategy::new()
        .run(flaky(&calls, 25, TestError::Transient), &CancellationToken::new())
        .execute(Some(1))
        .unwrap();
    assert!(attempts.succeeded());
    assert_eq!(attempts.attempt_count(), 26);
    assert_eq!(attempts.len(), 1);
}
