#![cfg(not(loom))]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use spsc_ring::wait::{Backoff, Spin, Timeout};
use spsc_ring::{Full, RingBuffer};

#[test]
fn one_million_values_cross_threads_in_order() {
    const N: u64 = 1_000_000;
    let ring = RingBuffer::<u64>::default();
    let producer = ring.acquire_producer_end().unwrap();
    let consumer = ring.acquire_consumer_end().unwrap();

    let tx = thread::spawn(move || {
        for i in 1..=N {
            let mut value = i;
            while let Err(Full(returned)) = producer.enqueue(value) {
                value = returned;
                thread::yield_now();
            }
        }
    });

    let rx = thread::spawn(move || {
        let mut expected = 1;
        while expected <= N {
            match consumer.dequeue() {
                Some(value) => {
                    assert_eq!(value, expected, "value out of order");
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }
    });

    tx.join().unwrap();
    rx.join().unwrap();
}

#[test]
fn producer_role_can_be_handed_between_threads() {
    // Each relay thread acquires the producer end, writes a batch and drops
    // the end again; the consumer sees one uninterrupted sequence.
    const BATCH: u64 = 1_000;
    const RELAYS: u64 = 8;

    let ring = Arc::new(RingBuffer::<u64>::new(16));
    let consumer = ring.acquire_consumer_end().unwrap();

    let relay = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            for relay in 0..RELAYS {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let producer = ring
                        .acquire_producer_end()
                        .expect("previous relay released the producer end");
                    let mut backoff = Backoff::new();
                    for i in 0..BATCH {
                        producer
                            .enqueue_with(relay * BATCH + i, &mut backoff, Timeout::Infinite)
                            .unwrap();
                    }
                })
                .join()
                .unwrap();
            }
        })
    };

    for expected in 0..RELAYS * BATCH {
        let value = consumer
            .dequeue_with(&mut Spin, Timeout::Duration(Duration::from_secs(10)))
            .expect("relay stalled");
        assert_eq!(value, expected);
    }
    relay.join().unwrap();
    assert!(!ring.is_producer_acquired());
}

#[test]
fn heap_values_are_neither_lost_nor_leaked() {
    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let ring = RingBuffer::new(8);
    let producer = ring.acquire_producer_end().unwrap();
    let consumer = ring.acquire_consumer_end().unwrap();
    drop(ring);

    let sent = {
        let drops = Arc::clone(&drops);
        thread::spawn(move || {
            let mut sent = 0;
            for _ in 0..100 {
                let value = Counted(Arc::clone(&drops));
                if producer.enqueue_with(value, &mut Spin, Duration::from_millis(1).into()).is_ok() {
                    sent += 1;
                }
            }
            sent
        })
        .join()
        .unwrap()
    };

    let mut received = 0;
    while let Some(value) = consumer.dequeue() {
        drop(value);
        received += 1;
    }
    drop(consumer);

    assert_eq!(received, sent, "every accepted value reaches the consumer");
    assert_eq!(drops.load(Ordering::SeqCst), 100);
}
