// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for shmchan.
//!
//! These tests run producer and consumer against real shared segments,
//! on separate threads where the property under test needs concurrency.

use std::thread;
use std::time::Duration;

use shmchan_core::{
    Capacity, ChannelConfig, Config, Consumer, Producer, RingError, Segment, SegmentName,
};

fn channel(tag: &str, capacity: usize) -> ChannelConfig {
    ChannelConfig {
        name: SegmentName::new(format!("shmchan-it-{}-{}", tag, std::process::id())).unwrap(),
        capacity: Capacity::new(capacity).unwrap(),
    }
}

fn backoff() -> shmchan_core::BackoffConfig {
    Config::default().backoff
}

/// Writing a value then reading once returns exactly that value.
#[test]
fn test_round_trip() {
    let channel = channel("roundtrip", 16);
    let producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    producer.write(0xDECAF).unwrap();
    assert_eq!(consumer.read().unwrap(), 0xDECAF);

    drop(producer);
    drop(consumer);
    Segment::destroy(&channel.name).unwrap();
}

/// N values written by the producer arrive in the same order, none
/// lost, none duplicated - across threads and a ring much smaller than
/// N, so both the full-wait and the empty-wait paths are exercised.
#[test]
fn test_fifo_order_under_contention() {
    let channel = channel("fifo", 4);
    const COUNT: u64 = 10_000;

    let producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    let writer = thread::spawn(move || {
        for value in 1..=COUNT {
            producer.write(value).unwrap();
        }
        // Drop closes the channel once every value is published.
    });

    let mut expected = 1u64;
    loop {
        match consumer.read() {
            Ok(value) => {
                assert_eq!(value, expected, "values must arrive in FIFO order");
                expected += 1;
            }
            Err(RingError::Closed) => break,
            Err(e) => panic!("unexpected read error: {}", e),
        }
    }
    assert_eq!(expected, COUNT + 1, "every written value must be delivered");

    writer.join().unwrap();
    drop(consumer);
    Segment::destroy(&channel.name).unwrap();
}

/// Capacity 4 gives 3 usable slots: writes 1, 2, 3 succeed immediately,
/// a 4th blocks until a read frees a slot, and delivery order holds.
#[test]
fn test_capacity_boundary_scenario() {
    let channel = channel("boundary", 4);
    let producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    producer.write(1).unwrap();
    producer.write(2).unwrap();
    producer.write(3).unwrap();

    // Ring is full: the fourth write must not go through, and the
    // timed-out attempt must leave the cursors untouched.
    let blocked = producer.write_deadline(4, Duration::from_millis(50));
    assert!(matches!(blocked, Err(RingError::Timeout { .. })));

    thread::scope(|s| {
        let pending = s.spawn(|| producer.write(4));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(consumer.read().unwrap(), 1);
        pending.join().unwrap().unwrap();
    });

    assert_eq!(consumer.read().unwrap(), 2);
    assert_eq!(consumer.read().unwrap(), 3);
    assert_eq!(consumer.read().unwrap(), 4);

    drop(producer);
    drop(consumer);
    Segment::destroy(&channel.name).unwrap();
}

/// A read on an empty ring times out without moving the read cursor.
#[test]
fn test_read_deadline_on_empty() {
    let channel = channel("read-deadline", 8);
    let producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    let empty = consumer.read_deadline(Duration::from_millis(20));
    assert!(matches!(empty, Err(RingError::Timeout { .. })));

    producer.write(9).unwrap();
    assert_eq!(consumer.read().unwrap(), 9);

    drop(producer);
    drop(consumer);
    Segment::destroy(&channel.name).unwrap();
}

/// The producer closes after its last value; the consumer drains every
/// published value before end-of-stream surfaces.
#[test]
fn test_end_of_stream_after_drain() {
    let channel = channel("eos", 8);
    let producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    producer.write(1).unwrap();
    producer.write(2).unwrap();
    producer.close();

    assert_eq!(consumer.read().unwrap(), 1);
    assert_eq!(consumer.read().unwrap(), 2);
    assert!(matches!(consumer.read(), Err(RingError::Closed)));

    drop(producer);
    drop(consumer);
    Segment::destroy(&channel.name).unwrap();
}

/// Both roles are exclusive: a second attach of either role fails fast
/// instead of silently corrupting the single-writer cursors.
#[test]
fn test_roles_are_exclusive() {
    let channel = channel("roles", 8);
    let _producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    let _consumer = Consumer::attach(&channel, &backoff()).expect("consumer attach");

    assert!(Producer::attach(&channel, &backoff()).is_err());
    assert!(Consumer::attach(&channel, &backoff()).is_err());

    Segment::destroy(&channel.name).unwrap();
}

/// Destroying a segment twice is not an error.
#[test]
fn test_destroy_idempotent() {
    let channel = channel("destroy", 8);
    {
        let _producer = Producer::attach(&channel, &backoff()).expect("producer attach");
    }

    Segment::destroy(&channel.name).expect("first destroy");
    Segment::destroy(&channel.name).expect("second destroy");
}

/// An attach whose capacity disagrees with the segment creator's build
/// is rejected at setup, not discovered as corruption at runtime.
#[test]
fn test_layout_mismatch_rejected() {
    let channel = channel("layout", 64);
    let _producer = Producer::attach(&channel, &backoff()).expect("producer attach");

    let wrong = ChannelConfig {
        name: channel.name.clone(),
        capacity: Capacity::new(256).unwrap(),
    };
    let err = Consumer::attach(&wrong, &backoff());
    assert!(err.is_err());

    Segment::destroy(&channel.name).unwrap();
}
