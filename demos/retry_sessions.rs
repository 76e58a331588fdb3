//! Retry Sessions Example
//!
//! Demonstrates retry sessions against a simulated file server.
//! Shows practical patterns including:
//! - Attempt limits with exponential backoff
//! - Errors that must never be retried
//! - Aggregated failures with per-attempt timing
//! - Duration budgets and bounded history
//! - Cancellation from another thread
//!
//! Run with: cargo run --example retry_sessions --features tracing

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reattempt::prelude::*;
use reattempt::RetryConfig;

/// Fails with `kind` for the first `failures` calls.
fn flaky_listing(
    failures: u32,
    kind: io::ErrorKind,
) -> impl Fn() -> io::Result<Vec<String>> + Send + Sync + 'static {
    let calls = Arc::new(AtomicU32::new(0));
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        println!("  Attempt {}", n + 1);
        if n < failures {
            Err(io::Error::new(kind, format!("{:?} on attempt {}", kind, n + 1)))
        } else {
            Ok(vec!["inbox/a.csv".to_string(), "inbox/b.csv".to_string()])
        }
    }
}

// ==================== Basic Retry ====================

/// Example 1: attempt limit with exponential backoff
fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let strategy = RetryStrategy::new()
        .with_attempt_limit(5)
        .with_failure_delay(Duration::from_millis(50))
        .with_backoff(Backoff::Exponential);

    let result = strategy
        .get(
            flaky_listing(2, io::ErrorKind::ConnectionReset),
            Vec::new(),
            &CancellationToken::new(),
        )
        .execute(None);

    match result {
        Ok(attempts) if attempts.succeeded() => println!(
            "  Listed {:?} after {} attempts in {:?}",
            attempts.success().map(Attempt::value),
            attempts.attempt_count(),
            attempts.duration()
        ),
        Ok(attempts) => println!("  Gave up after {} attempts", attempts.attempt_count()),
        Err(propagated) => println!("  Propagated: {}", propagated),
    }
}

// ==================== Conditional Retry ====================

/// Example 2: permission errors end the session immediately
fn example_throw_when() {
    println!("\n=== Example 2: Errors That Are Never Retried ===");

    let strategy = RetryStrategy::new()
        .with_attempt_limit(5)
        .throw_when(|err: &io::Error| err.kind() == io::ErrorKind::PermissionDenied);

    let result = strategy
        .get(
            flaky_listing(10, io::ErrorKind::PermissionDenied),
            Vec::new(),
            &CancellationToken::new(),
        )
        .execute(None);

    if let Err(propagated) = result {
        println!(
            "  Stopped on first attempt: {} ({:?})",
            propagated,
            propagated.attempt().duration()
        );
    }
}

// ==================== Aggregated Failure ====================

/// Example 3: every cause is reported when the session cannot succeed
fn example_aggregated_failure() {
    println!("\n=== Example 3: Aggregated Failure ===");

    let session = Session::new(
        RetryStrategy::new()
            .with_attempt_limit(3)
            .with_failure_delay(Duration::from_millis(10)),
    )
    .with_message("could not list remote directory");

    match session.get_or_fail(flaky_listing(10, io::ErrorKind::TimedOut), Vec::new()) {
        Ok(_) => println!("  Unexpected success"),
        Err(err) => println!("  {}", err),
    }
}

// ==================== Budgets ====================

/// Example 4: duration budget loaded from configuration, bounded history
fn example_config_budget() {
    println!("\n=== Example 4: Duration Budget From Config ===");

    let config = RetryConfig {
        max_duration_ms: 200,
        failure_delay_ms: 30,
        max_retained_attempts: Some(2),
        ..RetryConfig::default()
    };

    let session = config.to_session::<io::Error>();
    let attempts = session
        .get(flaky_listing(u32::MAX, io::ErrorKind::ConnectionRefused), Vec::new())
        .unwrap_or_else(|propagated| panic!("nothing propagates here: {}", propagated));

    println!(
        "  {} attempts in {:?}, {} retained",
        attempts.attempt_count(),
        attempts.duration(),
        attempts.len()
    );
}

// ==================== Cancellation ====================

/// Example 5: cancelling interrupts a long failure delay
fn example_cancellation() {
    println!("\n=== Example 5: Cancellation ===");

    let session = Session::new(
        RetryStrategy::new()
            .with_attempt_limit(10)
            .with_failure_delay(Duration::from_secs(30)),
    );

    let remote = session.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        println!("  Cancelling");
        remote.cancel();
    });

    let attempts = session
        .run(|| Err(io::Error::new(io::ErrorKind::TimedOut, "server busy")))
        .unwrap_or_else(|propagated| panic!("nothing propagates here: {}", propagated));

    println!(
        "  Stopped after {} attempt(s), succeeded: {}",
        attempts.attempt_count(),
        attempts.succeeded()
    );
    let _ = canceller.join();
}

fn main() {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Retry Sessions Examples");
    println!("=======================");

    example_basic_retry();
    example_throw_when();
    example_aggregated_failure();
    example_config_budget();
    example_cancellation();

    println!("\n=== All examples completed successfully! ===");
}
