//! Offloaded Session Example
//!
//! Runs a whole retry session on tokio's blocking pool while the async
//! runtime keeps serving other tasks.
//!
//! Run with: cargo run --example offloaded_session --features async

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reattempt::offload;
use reattempt::prelude::*;

#[tokio::main]
async fn main() {
    let calls = Arc::new(AtomicU32::new(0));
    let session = Session::new(
        RetryStrategy::new()
            .with_attempt_limit(6)
            .with_failure_delay(Duration::from_millis(100))
            .with_backoff(Backoff::Linear {
                step: Duration::from_millis(50),
            }),
    );

    let heartbeat = tokio::spawn(async {
        for tick in 1..=5 {
            tokio::time::sleep(Duration::from_millis(80)).await;
            println!("  heartbeat {}", tick);
        }
    });

    let upload = {
        let calls = calls.clone();
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            println!("  upload attempt {}", n + 1);
            if n < 3 {
                Err(format!("channel closed on attempt {}", n + 1))
            } else {
                Ok(())
            }
        }
    };

    match session.run_async(upload).await {
        Ok(attempts) => println!(
            "Upload finished: succeeded={} after {} attempts in {:?}",
            attempts.succeeded(),
            attempts.attempt_count(),
            attempts.duration()
        ),
        Err(propagated) => println!("Upload aborted: {}", propagated),
    }

    let _ = heartbeat.await;

    // The free functions take any attempt sequence.
    let value = offload::value_or_default(
        repeatedly::get(|| "not a number".parse::<u32>(), 0).take(3),
    )
    .await
    .unwrap_or_default();
    println!("Parsed value with fallback: {}", value);
}
