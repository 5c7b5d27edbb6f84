//! Buffered publisher integration tests.

#[path = "../support/mod.rs"]
mod support;

use std::thread;
use std::time::{Duration, Instant};

use confirm_relay::{BufferConfig, BufferedPublisher, FailureKind, PublishError, PublisherConfig};

use support::{failing_message, message, RecordingObserver};

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn full_buffer_is_published_as_one_batch() {
    let broker = support::broker();
    let buffered = BufferedPublisher::spawn(
        support::publisher(&broker),
        &BufferConfig::new(3, Duration::from_secs(60)),
    );
    let observer = RecordingObserver::new();
    let _subscription = buffered.subscribe(observer.clone());

    for id in ["a", "b", "c", "d"] {
        buffered.publish(message(buffered.publisher(), id)).unwrap();
    }

    assert_eq!(
        observer.next_batches(),
        vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
    );
    assert_eq!(buffered.len(), 1);
}

#[test]
fn idle_buffer_is_flushed_after_the_ttl() {
    let broker = support::broker();
    let buffered = BufferedPublisher::spawn(
        support::publisher(&broker),
        &BufferConfig::new(100, Duration::from_millis(30)),
    );

    buffered.publish(message(buffered.publisher(), "a")).unwrap();
    buffered.publish(message(buffered.publisher(), "b")).unwrap();

    assert!(wait_for(|| broker.delivered().len() == 2));
    assert_eq!(broker.stats().flushes, 1);
}

#[test]
fn failures_inside_a_flush_reach_observers() {
    let broker = support::broker();
    let buffered = BufferedPublisher::spawn(
        support::publisher(&broker),
        &BufferConfig::new(2, Duration::from_secs(60)),
    );
    let observer = RecordingObserver::new();
    let _subscription = buffered.subscribe(observer.clone());

    buffered.publish(message(buffered.publisher(), "a")).unwrap();
    buffered.publish(failing_message("b")).unwrap();

    assert_eq!(
        observer.errors(),
        vec![(FailureKind::PartialFailure, vec!["b".to_string()])]
    );
    assert_eq!(observer.next_batches(), vec![vec!["a".to_string()]]);
}

#[test]
fn dropping_flushes_and_completes() {
    let broker = support::broker();
    let observer = RecordingObserver::new();
    {
        let buffered = BufferedPublisher::spawn(
            support::publisher(&broker),
            &BufferConfig::new(100, Duration::from_secs(60)),
        );
        buffered.subscribe(observer.clone()).detach();
        buffered.publish(message(buffered.publisher(), "a")).unwrap();
    }

    assert_eq!(broker.delivered_correlation_ids(), vec!["a"]);
    assert_eq!(observer.completions(), 1);
}

#[test]
fn publishing_after_dispose_fails() {
    let broker = support::broker();
    let buffered = BufferedPublisher::spawn(support::publisher(&broker), &BufferConfig::default());
    let late = message(buffered.publisher(), "late");

    buffered.dispose();

    assert!(matches!(buffered.publish(late), Err(PublishError::Disposed)));
    assert!(broker.delivered().is_empty());
}

#[test]
fn buffer_settings_come_from_config() {
    let config = PublisherConfig::from_json_str(r#"{"buffer": {"capacity": 2, "idle_ttl_ms": 60000}}"#)
        .unwrap();
    let broker = support::broker();
    let publisher = confirm_relay::Publisher::from_config(&config, broker.clone()).unwrap();
    let buffered = BufferedPublisher::spawn(publisher, &config.buffer.unwrap_or_default());

    buffered.publish(message(buffered.publisher(), "a")).unwrap();
    assert!(broker.delivered().is_empty());
    buffered.publish(message(buffered.publisher(), "b")).unwrap();

    assert_eq!(buffered.capacity(), 2);
    assert_eq!(broker.delivered_correlation_ids(), vec!["a", "b"]);
}
