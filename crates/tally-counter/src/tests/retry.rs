//! Retry budget and backoff behavior.

use super::helpers::{TABLE, flaky_fixture};
use crate::error::CounterError;

#[tokio::test]
async fn test_bounded_contention_is_absorbed() {
    // Five failed writes, then clean: well within a 100-attempt budget.
    let counter = flaky_fixture(5, 100).await;

    counter.increment(TABLE, "hits", 1, 4).await.unwrap();
    assert_eq!(counter.total(TABLE, "hits", true).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_exhaustion_surfaces_key_and_attempts() {
    // Every write fails: the budget must run out, terminally.
    let counter = flaky_fixture(u32::MAX, 5).await;

    let err = counter.increment(TABLE, "hot", 1, 4).await.unwrap_err();
    match err {
        CounterError::RetryExhausted { ref key, attempts } => {
            assert_eq!(key, "hot");
            assert_eq!(attempts, 5);
        }
        other => panic!("expected RetryExhausted, got: {other:?}"),
    }
    // The message names the key and the budget for log consumers.
    let message = err.to_string();
    assert!(message.contains("hot"), "message: {message}");
    assert!(message.contains('5'), "message: {message}");
}

#[tokio::test]
async fn test_exhaustion_never_reports_silent_success() {
    let counter = flaky_fixture(u32::MAX, 3).await;
    assert!(counter.increment(TABLE, "hot", 1, 1).await.is_err());
    // Nothing may have been recorded.
    assert_eq!(counter.total(TABLE, "hot", true).await.unwrap(), None);
}

#[tokio::test]
async fn test_budget_boundary() {
    // Exactly as many failures as the budget minus one: the last attempt
    // succeeds.
    let counter = flaky_fixture(4, 5).await;
    counter.increment(TABLE, "edge", 1, 1).await.unwrap();
    assert_eq!(counter.total(TABLE, "edge", false).await.unwrap(), Some(1));
}
