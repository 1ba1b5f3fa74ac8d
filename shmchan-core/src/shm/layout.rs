// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared segment layout: header plus slot array.
//!
//! The header is the first 64 bytes of every segment. The creator fills
//! it in and publishes the magic word last; openers wait for the magic,
//! then check the layout tag and capacity before touching any slot.
//! A mismatch means the two binaries disagree on the wire layout and
//! attaching must fail rather than corrupt data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::LayoutError;
use crate::types::Capacity;

/// "SHMCHAN1" in ASCII. Bumped together with LAYOUT_VERSION.
pub(crate) const LAYOUT_MAGIC: u64 = 0x5348_4D43_4841_4E31;

/// Version of the header + slot layout described by this module.
pub(crate) const LAYOUT_VERSION: u32 = 1;

/// Header size in bytes. The slot array starts immediately after.
pub const HEADER_SIZE: usize = 64;

/// How long an opener waits for the creator to publish the magic word.
const INIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Segment header stored at the start of shared memory.
///
/// Each cursor has exactly one writer: `write_idx` the producer,
/// `read_idx` the consumer. Both are read by both sides.
#[repr(C)]
pub(crate) struct SegmentHeader {
    /// LAYOUT_MAGIC once initialization is complete.
    pub magic: AtomicU64,
    /// crc32 over (LAYOUT_VERSION, capacity), see [`layout_tag`].
    pub layout_crc: AtomicU64,
    /// Slot count. Fixed at creation, power of two.
    pub capacity: AtomicU64,
    /// Pid of the attached producer, 0 when the role is free.
    pub producer_claim: AtomicU64,
    /// Pid of the attached consumer, 0 when the role is free.
    pub consumer_claim: AtomicU64,
    /// Set to 1 by the producer when no further values will be written.
    pub closed: AtomicU64,
    /// Next slot to write, in [0, capacity).
    pub write_idx: AtomicU64,
    /// Next slot to read, in [0, capacity).
    pub read_idx: AtomicU64,
}

const _: () = assert!(std::mem::size_of::<SegmentHeader>() == HEADER_SIZE);

/// Total segment size for a given capacity, identical on both backends.
pub fn segment_size(capacity: Capacity) -> usize {
    HEADER_SIZE + capacity.get() * std::mem::size_of::<u64>()
}

/// Integrity tag covering everything two binaries must agree on.
pub(crate) fn layout_tag(capacity: u64) -> u32 {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&LAYOUT_VERSION.to_le_bytes());
    bytes[4..].copy_from_slice(&capacity.to_le_bytes());
    crc32fast::hash(&bytes)
}

/// Initialize the header of a freshly created, zeroed segment.
///
/// # Safety
/// Caller must hold the only mapping of a segment of at least
/// [`segment_size`] bytes whose contents are still all-zero.
pub(crate) unsafe fn init_header(base: *mut u8, capacity: Capacity) {
    let header = &*(base as *const SegmentHeader);
    let slots = capacity.get() as u64;

    header.capacity.store(slots, Ordering::Relaxed);
    header
        .layout_crc
        .store(layout_tag(slots) as u64, Ordering::Relaxed);
    header.producer_claim.store(0, Ordering::Relaxed);
    header.consumer_claim.store(0, Ordering::Relaxed);
    header.closed.store(0, Ordering::Relaxed);
    header.write_idx.store(0, Ordering::Relaxed);
    header.read_idx.store(0, Ordering::Relaxed);

    // Publish last: an opener that observes the magic with Acquire is
    // guaranteed to observe every field stored above.
    header.magic.store(LAYOUT_MAGIC, Ordering::Release);
}

/// Validate the header of an opened segment against this build.
///
/// Waits briefly for a creator that is still mid-initialization, then
/// checks magic, layout tag, and capacity.
///
/// # Safety
/// `base` must point at a mapped region of at least [`segment_size`]
/// bytes shared with the creator.
pub(crate) unsafe fn validate_header(
    base: *const u8,
    expected: Capacity,
) -> Result<(), LayoutError> {
    let header = &*(base as *const SegmentHeader);

    let start = Instant::now();
    loop {
        match header.magic.load(Ordering::Acquire) {
            LAYOUT_MAGIC => break,
            // Still zero: the creator may be mid-initialization.
            0 => {
                if start.elapsed() >= INIT_TIMEOUT {
                    return Err(LayoutError::InitTimeout);
                }
                std::thread::yield_now();
            }
            // Nonzero garbage never turns into the right magic.
            found => return Err(LayoutError::BadMagic { found }),
        }
    }

    let actual = header.capacity.load(Ordering::Relaxed);
    let expected_slots = expected.get() as u64;
    if actual != expected_slots {
        return Err(LayoutError::CapacityMismatch {
            expected: expected_slots,
            actual,
        });
    }

    let found = header.layout_crc.load(Ordering::Relaxed) as u32;
    let tag = layout_tag(actual);
    if found != tag {
        return Err(LayoutError::TagMismatch {
            expected: tag,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_size() {
        let capacity = Capacity::new(4).unwrap();
        assert_eq!(segment_size(capacity), HEADER_SIZE + 32);

        let capacity = Capacity::new(1024).unwrap();
        assert_eq!(segment_size(capacity), HEADER_SIZE + 8192);
    }

    #[test]
    fn test_layout_tag_tracks_capacity() {
        assert_ne!(layout_tag(1024), layout_tag(4096));
        assert_eq!(layout_tag(1024), layout_tag(1024));
    }

    /// u64-backed buffer so the header cast sees 8-byte alignment.
    fn zeroed_backing(capacity: Capacity) -> Vec<u64> {
        vec![0u64; segment_size(capacity) / 8]
    }

    #[test]
    fn test_init_then_validate() {
        let mut backing = zeroed_backing(Capacity::new(16).unwrap());
        let base = backing.as_mut_ptr() as *mut u8;

        unsafe {
            init_header(base, Capacity::new(16).unwrap());
            assert!(validate_header(base, Capacity::new(16).unwrap()).is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_capacity_mismatch() {
        let mut backing = zeroed_backing(Capacity::new(64).unwrap());
        let base = backing.as_mut_ptr() as *mut u8;

        unsafe {
            init_header(base, Capacity::new(64).unwrap());
            let err = validate_header(base, Capacity::new(16).unwrap()).unwrap_err();
            assert!(matches!(err, LayoutError::CapacityMismatch { .. }));
        }
    }

    #[test]
    fn test_validate_rejects_garbage_magic() {
        let mut backing = zeroed_backing(Capacity::new(16).unwrap());
        let base = backing.as_mut_ptr() as *mut u8;

        unsafe {
            let header = &*(base as *const SegmentHeader);
            header.magic.store(0xDEAD_BEEF, Ordering::Release);
            let err = validate_header(base, Capacity::new(16).unwrap()).unwrap_err();
            assert!(matches!(err, LayoutError::BadMagic { .. }));
        }
    }
}
