//! Retry behavior integration tests: timing, narrowing and exhaustion.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use confirm_relay::{
    ArithmeticBackoff, Batch, Behavior, BehaviorChain, CancellationToken, ConfirmPublisher,
    FailureKind, FnBehavior, GeometricBackoff, Next, PipelineError, Publisher, PublisherConfig,
    RetryBehavior,
};
use parking_lot::Mutex;

use support::{message, RecordingObserver};

/// Records the size of every batch that reaches the terminal.
fn batch_sizes(sizes: Arc<Mutex<Vec<usize>>>) -> FnBehavior {
    FnBehavior::new("batch-sizes", move |batch: Batch, next, cancel| {
        sizes.lock().push(batch.len());
        next.run(batch, cancel)
    })
}

#[test]
fn arithmetic_retry_waits_between_attempts_and_returns_the_last_error() {
    let calls: Arc<Mutex<Vec<Instant>>> = Arc::default();
    let recorder = calls.clone();
    let terminal = FnBehavior::new("always-fails", move |_, _, _| {
        let attempt = {
            let mut calls = recorder.lock();
            calls.push(Instant::now());
            calls.len()
        };
        Err(PipelineError::other(format!("attempt {} failed", attempt)))
    });
    let retry = RetryBehavior::new(
        ArithmeticBackoff::new(1, Duration::from_millis(100)).with_max_attempts(2),
    );
    let chain = BehaviorChain::create(Box::new(terminal), vec![Box::new(retry) as Box<dyn Behavior>]);

    let publisher = support::publisher(&support::broker());
    let error = chain
        .execute(
            Batch::single(message(&publisher, "a")),
            Next::end(),
            &CancellationToken::none(),
        )
        .unwrap_err();

    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].duration_since(calls[0]) >= Duration::from_millis(100));
    assert_eq!(error.to_string(), "attempt 2 failed");
}

#[test]
fn retry_only_resends_the_messages_that_failed() {
    let broker = support::broker();
    broker.reject("b", 1);
    broker.reject("c", 1);
    let sizes: Arc<Mutex<Vec<usize>>> = Arc::default();
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .retry(ArithmeticBackoff::new(0, Duration::from_millis(1)).with_max_attempts(2))
        .behavior(batch_sizes(sizes.clone()))
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![
        message(&publisher, "a"),
        message(&publisher, "b"),
        message(&publisher, "c"),
    ]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(*sizes.lock(), vec![3, 2]);
    assert_eq!(broker.delivered_correlation_ids(), vec!["a", "b", "c"]);
    assert!(observer.errors().is_empty());
    assert_eq!(
        observer.next_batches(),
        vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
    );
}

#[test]
fn exhausted_retry_reports_what_still_failed() {
    let broker = support::broker();
    broker.reject("b", 10);
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .retry(GeometricBackoff::new(2.0, Duration::from_millis(1)).with_max_attempts(3))
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![message(&publisher, "a"), message(&publisher, "b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.errors(),
        vec![(FailureKind::TotalFailure, vec!["b".to_string()])]
    );
    assert_eq!(observer.next_batches(), vec![vec!["a".to_string()]]);
    assert_eq!(broker.delivered_correlation_ids(), vec!["a"]);
}

#[test]
fn cancelling_during_backoff_stops_retrying() {
    let broker = support::broker();
    broker.reject("a", 10);
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .retry(ArithmeticBackoff::new(0, Duration::from_secs(30)))
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    let background = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });

    let started = Instant::now();
    publisher
        .publish(message(&publisher, "a"), &cancel)
        .unwrap();
    background.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(observer.errors().len(), 1);
    assert_eq!(broker.stats().sessions_opened, 1);
}

#[test]
fn retry_configured_from_json() {
    let broker = support::broker();
    broker.reject("a", 2);
    let config = PublisherConfig::from_json_str(
        r#"{"retry": {"strategy": "arithmetic", "coefficient": 1, "delay_ms": 1, "max_attempts": 3}}"#,
    )
    .unwrap();
    let publisher = Publisher::from_config(&config, broker.clone()).unwrap();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    publisher
        .publish(message(&publisher, "a"), &CancellationToken::none())
        .unwrap();

    assert_eq!(publisher.behaviors(), vec!["retry", "confirm-publisher"]);
    assert_eq!(broker.delivered_correlation_ids(), vec!["a"]);
    assert!(observer.errors().is_empty());
}
