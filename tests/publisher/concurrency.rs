//! Many threads publishing through one publisher.

use std::sync::{Arc, Barrier};
use std::thread;

use confirm_relay::CancellationToken;

use crate::support::{self, message, RecordingObserver};

const THREADS: usize = 16;

#[test]
fn concurrent_publishes_share_one_connection() {
    let broker = support::broker();
    let publisher = Arc::new(support::publisher(&broker));
    let observer = RecordingObserver::new();
    let _subscription = publisher.subscribe(observer.clone());
    let start = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|n| {
            let publisher = Arc::clone(&publisher);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let message = message(&publisher, &format!("m{}", n));
                start.wait();
                publisher.publish(message, &CancellationToken::none())
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap().unwrap();
    }

    let stats = broker.stats();
    assert_eq!(stats.connections_opened, 1);
    assert_eq!(stats.sessions_opened, THREADS);
    assert_eq!(stats.sessions_closed, THREADS);
    assert_eq!(broker.delivered().len(), THREADS);
    assert_eq!(observer.next_batches().len(), THREADS);
    assert!(observer.errors().is_empty());
}
