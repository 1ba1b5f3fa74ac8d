// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wait-free SPSC ring engine over a mapped segment.
//!
//! Exactly one [`Producer`] and one [`Consumer`] per segment, enforced by
//! pid claims in the header. The producer is the sole writer of
//! `write_idx`, the consumer of `read_idx`; a slot store is published by
//! a Release store of `write_idx` and observed by the consumer's Acquire
//! load, which is the entire synchronization contract - no locks, no
//! syscalls on the data path.
//!
//! Full and empty waits are bounded-quantum spins with a cooperative
//! yield between checks. The fullness re-check is a loop, never a single
//! test: one check followed by a store could overwrite the slot the
//! consumer is still reading.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::{BackoffConfig, ChannelConfig};
use crate::error::{RingError, SegmentError, ShmChanResult};
use crate::shm::layout::{self, SegmentHeader, HEADER_SIZE};
use crate::shm::Segment;
use crate::types::{Capacity, SegmentName};

/// Spin-wait policy for one side of the ring.
///
/// Spins on the monotonic clock for `quantum` between re-checks,
/// yielding the CPU cooperatively. Replace the quantum through
/// [`BackoffConfig`] rather than editing call sites.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    quantum: Duration,
}

impl BackoffPolicy {
    pub fn new(quantum: Duration) -> Self {
        Self { quantum }
    }

    fn spin(&self) {
        let start = Instant::now();
        loop {
            std::thread::yield_now();
            if start.elapsed() >= self.quantum {
                break;
            }
        }
    }
}

/// Typed view over a mapped segment: header plus slot array.
struct RingView {
    segment: Segment,
    mask: u64,
}

impl RingView {
    fn new(segment: Segment, capacity: Capacity) -> Self {
        Self {
            segment,
            mask: capacity.mask(),
        }
    }

    fn header(&self) -> &SegmentHeader {
        // SAFETY: attach validated that the mapping starts with an
        // initialized SegmentHeader
        unsafe { &*(self.segment.as_ptr() as *const SegmentHeader) }
    }

    fn slot(&self, index: u64) -> &AtomicU64 {
        debug_assert!(index <= self.mask);
        // SAFETY: index < capacity and the mapping covers
        // HEADER_SIZE + capacity * 8 bytes
        unsafe {
            let slots = self.segment.as_ptr().add(HEADER_SIZE) as *const AtomicU64;
            &*slots.add(index as usize)
        }
    }
}

/// Create-or-open the named segment sized for `capacity`.
///
/// Whichever process attaches first creates and initializes the header;
/// later attaches open and validate it against this build's layout.
fn attach_segment(name: &SegmentName, capacity: Capacity) -> ShmChanResult<Segment> {
    let size = layout::segment_size(capacity);
    match Segment::create(name, size) {
        Ok(segment) => {
            // SAFETY: fresh zero-initialized mapping of `size` bytes
            unsafe { layout::init_header(segment.as_ptr(), capacity) };
            Ok(segment)
        }
        Err(SegmentError::AlreadyExists { .. }) => {
            let segment = Segment::open(name, size)?;
            // SAFETY: mapping covers `size` bytes shared with the creator
            unsafe { layout::validate_header(segment.as_ptr(), capacity)? };
            Ok(segment)
        }
        Err(e) => Err(e.into()),
    }
}

fn claim_role(cell: &AtomicU64, role: &'static str) -> Result<u64, RingError> {
    let pid = std::process::id() as u64;
    match cell.compare_exchange(0, pid, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => Ok(pid),
        Err(owner) => Err(RingError::RoleClaimed { role, pid: owner }),
    }
}

fn release_role(cell: &AtomicU64, pid: u64) {
    // Only clear our own claim; a stale value belongs to someone else.
    let _ = cell.compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Acquire);
}

/// Write end of the channel. One per segment.
pub struct Producer {
    view: RingView,
    backoff: BackoffPolicy,
    pid: u64,
}

impl Producer {
    /// Attach the producer role: create-or-open the segment, validate
    /// its layout, and claim the producer slot. Fails fast with
    /// [`RingError::RoleClaimed`] if another producer is attached.
    pub fn attach(channel: &ChannelConfig, backoff: &BackoffConfig) -> ShmChanResult<Self> {
        let segment = attach_segment(&channel.name, channel.capacity)?;
        let view = RingView::new(segment, channel.capacity);
        let pid = claim_role(&view.header().producer_claim, "producer")?;

        tracing::debug!(name = %channel.name, pid = pid, "Producer attached");

        Ok(Self {
            view,
            backoff: BackoffPolicy::new(backoff.full_spin),
            pid,
        })
    }

    /// Write one value, blocking while the ring is full.
    ///
    /// Never gives up: spins with the configured full-wait quantum until
    /// the consumer frees a slot. Returns [`RingError::Closed`] only if
    /// this producer already closed the channel.
    pub fn write(&self, value: u64) -> Result<(), RingError> {
        self.write_inner(value, None)
    }

    /// Write one value, giving up after `deadline`.
    ///
    /// On [`RingError::Timeout`] the write index has not moved and no
    /// slot was touched; the operation can simply be retried.
    pub fn write_deadline(&self, value: u64, deadline: Duration) -> Result<(), RingError> {
        self.write_inner(value, Some(deadline))
    }

    fn write_inner(&self, value: u64, deadline: Option<Duration>) -> Result<(), RingError> {
        let header = self.view.header();

        if header.closed.load(Ordering::Acquire) != 0 {
            return Err(RingError::Closed);
        }

        // Sole writer of write_idx; no synchronization needed against
        // ourselves.
        let write = header.write_idx.load(Ordering::Relaxed);
        let next = (write + 1) & self.view.mask;

        let start = Instant::now();
        while header.read_idx.load(Ordering::Acquire) == next {
            if let Some(limit) = deadline {
                let waited = start.elapsed();
                if waited >= limit {
                    return Err(RingError::Timeout { waited });
                }
            }
            self.backoff.spin();
        }

        self.view.slot(write).store(value, Ordering::Relaxed);
        // The slot store above happens-before this publish; a consumer
        // that observes `next` observes the value.
        header.write_idx.store(next, Ordering::Release);
        Ok(())
    }

    /// Signal end-of-stream. The consumer drains any published values,
    /// then observes [`RingError::Closed`]. Idempotent; also fired on
    /// drop so a graceful producer exit never strands the consumer.
    pub fn close(&self) {
        self.view.header().closed.store(1, Ordering::Release);
    }

    /// Name of the underlying segment.
    pub fn segment_name(&self) -> &str {
        self.view.segment.name()
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.close();
        release_role(&self.view.header().producer_claim, self.pid);
        tracing::debug!(name = %self.view.segment.name(), "Producer detached");
    }
}

/// Read end of the channel. One per segment.
pub struct Consumer {
    view: RingView,
    backoff: BackoffPolicy,
    pid: u64,
}

impl Consumer {
    /// Attach the consumer role. Same create-or-open and validation
    /// path as the producer, claiming the consumer slot instead.
    pub fn attach(channel: &ChannelConfig, backoff: &BackoffConfig) -> ShmChanResult<Self> {
        let segment = attach_segment(&channel.name, channel.capacity)?;
        let view = RingView::new(segment, channel.capacity);
        let pid = claim_role(&view.header().consumer_claim, "consumer")?;

        tracing::debug!(name = %channel.name, pid = pid, "Consumer attached");

        Ok(Self {
            view,
            backoff: BackoffPolicy::new(backoff.empty_spin),
            pid,
        })
    }

    /// Read one value, blocking while the ring is empty.
    ///
    /// Returns [`RingError::Closed`] once the producer has closed the
    /// channel and every published value has been drained.
    pub fn read(&self) -> Result<u64, RingError> {
        self.read_inner(None)
    }

    /// Read one value, giving up after `deadline`.
    ///
    /// On [`RingError::Timeout`] the read index has not moved.
    pub fn read_deadline(&self, deadline: Duration) -> Result<u64, RingError> {
        self.read_inner(Some(deadline))
    }

    fn read_inner(&self, deadline: Option<Duration>) -> Result<u64, RingError> {
        let header = self.view.header();

        // Sole writer of read_idx; no synchronization needed against
        // ourselves.
        let read = header.read_idx.load(Ordering::Relaxed);

        let start = Instant::now();
        loop {
            if header.write_idx.load(Ordering::Acquire) != read {
                break;
            }
            if header.closed.load(Ordering::Acquire) != 0 {
                // close() happens after the final publish, so this
                // re-check cannot miss a value published before it.
                if header.write_idx.load(Ordering::Acquire) == read {
                    return Err(RingError::Closed);
                }
                break;
            }
            if let Some(limit) = deadline {
                let waited = start.elapsed();
                if waited >= limit {
                    return Err(RingError::Timeout { waited });
                }
            }
            self.backoff.spin();
        }

        // The Acquire load that exited the loop orders this slot read
        // after the producer's slot store.
        let value = self.view.slot(read).load(Ordering::Relaxed);
        header.read_idx.store((read + 1) & self.view.mask, Ordering::Release);
        Ok(value)
    }

    /// Name of the underlying segment.
    pub fn segment_name(&self) -> &str {
        self.view.segment.name()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        release_role(&self.view.header().consumer_claim, self.pid);
        tracing::debug!(name = %self.view.segment.name(), "Consumer detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_channel(tag: &str, capacity: usize) -> ChannelConfig {
        ChannelConfig {
            name: SegmentName::new(format!("shmchan-ring-{}-{}", tag, std::process::id()))
                .unwrap(),
            capacity: Capacity::new(capacity).unwrap(),
        }
    }

    fn backoff() -> BackoffConfig {
        Config::default().backoff
    }

    #[test]
    fn test_round_trip() {
        let channel = test_channel("roundtrip", 8);
        let producer = Producer::attach(&channel, &backoff()).unwrap();
        let consumer = Consumer::attach(&channel, &backoff()).unwrap();

        producer.write(7).unwrap();
        assert_eq!(consumer.read().unwrap(), 7);

        drop(producer);
        drop(consumer);
        Segment::destroy(&channel.name).unwrap();
    }

    #[test]
    fn test_producer_role_claimed_once() {
        let channel = test_channel("claim", 8);
        let _producer = Producer::attach(&channel, &backoff()).unwrap();

        let second = Producer::attach(&channel, &backoff());
        match second {
            Err(crate::error::ShmChanError::Ring(RingError::RoleClaimed { role, .. })) => {
                assert_eq!(role, "producer");
            }
            other => panic!("expected RoleClaimed, got {:?}", other.map(|_| ())),
        }

        Segment::destroy(&channel.name).unwrap();
    }

    #[test]
    fn test_closed_after_producer_drop() {
        let channel = test_channel("closed", 8);
        let producer = Producer::attach(&channel, &backoff()).unwrap();
        let consumer = Consumer::attach(&channel, &backoff()).unwrap();

        producer.write(1).unwrap();
        producer.write(2).unwrap();
        drop(producer);

        // Published values drain before end-of-stream surfaces.
        assert_eq!(consumer.read().unwrap(), 1);
        assert_eq!(consumer.read().unwrap(), 2);
        assert!(matches!(consumer.read(), Err(RingError::Closed)));

        drop(consumer);
        Segment::destroy(&channel.name).unwrap();
    }

    #[test]
    fn test_write_after_close_rejected() {
        let channel = test_channel("write-closed", 8);
        let producer = Producer::attach(&channel, &backoff()).unwrap();

        producer.write(1).unwrap();
        producer.close();
        assert!(matches!(producer.write(2), Err(RingError::Closed)));

        drop(producer);
        Segment::destroy(&channel.name).unwrap();
    }

    #[test]
    fn test_capacity_mismatch_rejected() {
        let channel = test_channel("mismatch", 64);
        let _producer = Producer::attach(&channel, &backoff()).unwrap();

        let wrong = ChannelConfig {
            name: channel.name.clone(),
            capacity: Capacity::new(16).unwrap(),
        };
        let consumer = Consumer::attach(&wrong, &backoff());
        assert!(consumer.is_err());

        Segment::destroy(&channel.name).unwrap();
    }
}
