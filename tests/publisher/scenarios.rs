//! End-to-end publishing through the facade.

use confirm_relay::{Batch, CancellationToken, FailureKind, Message};
use std::sync::Arc;

use crate::support::{self, failing_message, message, Event, RecordingObserver};

#[test]
fn single_message_is_confirmed() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    publisher
        .publish(message(&publisher, "a"), &CancellationToken::none())
        .unwrap();

    assert_eq!(observer.events(), vec![Event::Next(vec!["a".into()])]);
    assert_eq!(broker.delivered_correlation_ids(), vec!["a"]);
}

#[test]
fn failing_serializer_splits_the_batch() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![message(&publisher, "a"), failing_message("b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.events(),
        vec![
            Event::Error {
                kind: FailureKind::PartialFailure,
                ids: vec!["b".into()],
            },
            Event::Next(vec!["a".into()]),
        ]
    );
    assert_eq!(broker.delivered_correlation_ids(), vec!["a"]);
}

#[test]
fn partial_failure_reports_disjoint_batches_covering_the_input() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![
        message(&publisher, "a"),
        failing_message("b"),
        message(&publisher, "c"),
    ]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    let succeeded = observer.next_batches();
    let failed = observer.errors();
    assert_eq!(succeeded, vec![vec!["a".to_string(), "c".to_string()]]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].1, vec!["b".to_string()]);

    let mut union: Vec<String> = succeeded[0].iter().chain(&failed[0].1).cloned().collect();
    union.sort();
    assert_eq!(union, vec!["a", "b", "c"]);
}

#[test]
fn failed_message_records_the_last_exception() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let failing = failing_message("b");

    publisher
        .publish(failing.clone(), &CancellationToken::none())
        .unwrap();

    let recorded = failing
        .header(confirm_relay::headers::LAST_EXCEPTION)
        .unwrap();
    assert_eq!(recorded.as_str(), Some("serializer exploded"));
}

#[test]
fn cancelled_message_is_dropped_without_error() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let token = CancellationToken::new();
    token.cancel();
    let cancelled = Arc::new(
        publisher
            .new_message()
            .routing(support::EXCHANGE, "placed")
            .cancellation(token)
            .build()
            .unwrap(),
    );

    publisher.publish(cancelled, &CancellationToken::none()).unwrap();

    assert!(observer.errors().is_empty());
    assert_eq!(broker.stats().flushes, 0);
    assert!(broker.delivered().is_empty());
}

#[test]
fn messages_are_staged_in_input_order() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let messages: Vec<Arc<Message>> = (0..5)
        .map(|i| message(&publisher, &format!("m{}", i)))
        .collect();

    publisher
        .publish_batch(Batch::new(messages), &CancellationToken::none())
        .unwrap();

    assert_eq!(
        broker.delivered_correlation_ids(),
        vec!["m0", "m1", "m2", "m3", "m4"]
    );
}

#[test]
fn headers_reach_the_broker() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let message = Arc::new(
        publisher
            .new_message()
            .routing(support::EXCHANGE, "placed")
            .correlation_id("h")
            .header("TenantId", "acme")
            .build()
            .unwrap(),
    );

    publisher.publish(message, &CancellationToken::none()).unwrap();

    let delivered = &broker.delivered()[0];
    assert_eq!(delivered.routing_key, "placed");
    for key in ["TenantId", "ExchangeName", "RoutingKey", "SerializerType", "CreatedAt", "PublishedAt"] {
        assert!(delivered.headers.contains(key), "missing header {}", key);
    }
}
