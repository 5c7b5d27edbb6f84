//! Failure classification as seen by observers.

use std::time::Duration;

use confirm_relay::transport::{ConfirmMode, TransportError};
use confirm_relay::{
    CancellationToken, ConfirmPublisher, FailureKind, NotConfirmedPolicy, PublishError, Publisher,
};

use crate::support::{self, failing_message, message, Event, RecordingObserver};

#[test]
fn total_failure_is_one_error_over_the_whole_batch() {
    let broker = support::broker();
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![failing_message("a"), failing_message("b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.events(),
        vec![Event::Error {
            kind: FailureKind::TotalFailure,
            ids: vec!["a".into(), "b".into()],
        }]
    );
    assert_eq!(broker.stats().flushes, 0);
}

#[test]
fn unconfirmed_batch_is_reported_not_raised_by_default() {
    let broker = support::broker();
    broker.set_confirm_mode(ConfirmMode::Timeout);
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .publishing_timeout(Duration::from_millis(20))
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![message(&publisher, "a"), message(&publisher, "b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.events(),
        vec![Event::Error {
            kind: FailureKind::NotConfirmed,
            ids: vec!["a".into(), "b".into()],
        }]
    );
}

#[test]
fn unconfirmed_batch_is_raised_when_configured() {
    let broker = support::broker();
    broker.set_confirm_mode(ConfirmMode::Nack);
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .not_confirmed(NotConfirmedPolicy::Raise)
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let result = publisher.publish(message(&publisher, "a"), &CancellationToken::none());

    match result {
        Err(PublishError::NotConfirmed(error)) => {
            assert_eq!(error.kind(), FailureKind::NotConfirmed);
            assert_eq!(error.batch().correlation_ids(), vec!["a"]);
        }
        other => panic!("expected NotConfirmed, got {:?}", other),
    }
    assert_eq!(observer.errors().len(), 1);
}

#[test]
fn late_confirm_within_timeout_succeeds() {
    let broker = support::broker();
    broker.set_confirm_mode(ConfirmMode::AckAfter(Duration::from_millis(10)));
    let publisher = Publisher::builder(ConfirmPublisher::new(broker.clone()))
        .publishing_timeout(Duration::from_millis(500))
        .build();
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    publisher
        .publish(message(&publisher, "a"), &CancellationToken::none())
        .unwrap();

    assert_eq!(observer.events(), vec![Event::Next(vec!["a".into()])]);
}

#[test]
fn access_refused_is_classified_as_forbidden() {
    let broker = support::broker();
    broker.fail_next_flush(TransportError::from_reply_code(403, "ACCESS_REFUSED"));
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![message(&publisher, "a"), message(&publisher, "b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.errors(),
        vec![(FailureKind::Forbidden, vec!["a".to_string(), "b".to_string()])]
    );
    assert!(observer.next_batches().is_empty());
}

#[test]
fn missing_destination_is_classified_as_not_found() {
    let broker = support::broker();
    broker.fail_next_flush(TransportError::from_reply_code(404, "NOT_FOUND"));
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    publisher
        .publish(message(&publisher, "a"), &CancellationToken::none())
        .unwrap();

    assert_eq!(observer.errors(), vec![(FailureKind::NotFound, vec!["a".to_string()])]);
}

#[test]
fn unreachable_broker_is_attributed_to_the_whole_batch() {
    let broker = support::broker();
    broker.refuse_connections(true);
    let publisher = support::publisher(&broker);
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());

    let batch = publisher.new_batch(vec![message(&publisher, "a"), message(&publisher, "b")]);
    publisher.publish_batch(batch, &CancellationToken::none()).unwrap();

    assert_eq!(
        observer.errors(),
        vec![(FailureKind::Unclassified, vec!["a".to_string(), "b".to_string()])]
    );
}
