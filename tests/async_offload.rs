//! Retry sessions offloaded onto tokio's blocking pool.

#![cfg(feature = "async")]

use reattempt::offload;
use reattempt::prelude::*;
use reattempt::testing::FlakyOperation;
use std::time::Duration;

#[tokio::test]
async fn offloaded_session_does_not_block_the_runtime() {
    let flaky = FlakyOperation::new(2, "busy".to_string());
    let session = Session::new(
        RetryStrategy::new()
            .with_attempt_limit(5)
            .with_failure_delay(Duration::from_millis(20)),
    );

    let ticker = tokio::spawn(async {
        let mut ticks = 0;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ticks += 1;
        }
        ticks
    });

    let attempts = session.run_async(flaky.action()).await.unwrap();
    assert!(attempts.succeeded());
    assert_eq!(flaky.calls(), 3);
    assert_eq!(ticker.await.unwrap(), 4);
}

#[tokio::test]
async fn offloaded_get_returns_value() {
    let session: Session<String> = RetryStrategy::new().with_attempt_limit(3).into();
    let attempts = session
        .get_async(|| Ok::<_, String>(String::from("listing")), String::new())
        .await
        .unwrap();
    assert_eq!(attempts.success().unwrap().value(), "listing");
}

#[tokio::test]
async fn offloaded_failure_carries_message() {
    let session = Session::new(RetryStrategy::new().with_attempt_limit(2)).with_message("rename failed");
    let err = session
        .run_or_fail_async(|| Err::<(), _>("locked".to_string()))
        .await
        .unwrap_err();
    let failure = err.into_exhausted().unwrap();
    assert_eq!(failure.message(), Some("rename failed"));
    assert_eq!(failure.attempt_count(), 2);
}

#[tokio::test]
async fn offloaded_cancellation() {
    let token = CancellationToken::new();
    let attempts = RetryStrategy::new()
        .with_attempt_limit(10)
        .with_failure_delay(Duration::from_secs(60))
        .run(|| Err::<(), _>("down".to_string()), &token);

    let session = tokio::spawn(offload::execute(attempts, None));
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let history = tokio::time::timeout(Duration::from_secs(10), session)
        .await
        .expect("session should stop once cancelled")
        .unwrap()
        .unwrap();
    assert_eq!(history.attempt_count(), 1);
    assert!(!history.succeeded());
}

#[tokio::test]
async fn single_attempts_offload() {
    let attempt = offload::attempt_get(|| "7".parse::<u8>(), 0).await;
    assert_eq!(*attempt.value(), 7);

    let attempt = offload::attempt_run(|| Err::<(), _>("nope")).await;
    assert_eq!(attempt.error(), Some(&"nope"));
}
