// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory channel engine.
//!
//! Two layers: the platform segment provider (named region lifecycle)
//! and the SPSC ring engine interpreting a mapped region as a slot
//! array plus two atomic cursors. Callers see one `Segment` type per
//! platform with an identical contract.

mod layout;
mod ring;

#[cfg(unix)]
mod segment;
#[cfg(windows)]
#[path = "windows.rs"]
mod segment;

pub use layout::{segment_size, HEADER_SIZE};
pub use ring::{BackoffPolicy, Consumer, Producer};
pub use segment::Segment;
