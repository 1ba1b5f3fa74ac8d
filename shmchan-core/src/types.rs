// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum segment name length. POSIX shm names are limited to NAME_MAX
/// minus the leading slash the backend prepends.
const MAX_NAME_LEN: usize = 63;

/// Smallest usable ring: one sentinel slot plus one data slot.
const MIN_CAPACITY: usize = 2;
/// Largest ring: 2^24 slots (128 MB of slot data).
const MAX_CAPACITY: usize = 1 << 24;

/// Validated shared segment name.
/// Must be non-empty, alphanumeric with hyphens/underscores, max 63 chars.
/// Producer and consumer must agree on it byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentName(String);

impl SegmentName {
    /// Create a new SegmentName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "name",
                value: name,
                reason: "Segment name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ConfigError::InvalidField {
                field: "name",
                value: name.clone(),
                reason: format!("Segment name too long: {} chars (max {})", name.len(), MAX_NAME_LEN),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidField {
                field: "name",
                value: name,
                reason: "Segment name must contain only alphanumeric characters, hyphens, and underscores".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SegmentName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SegmentName> for String {
    fn from(name: SegmentName) -> Self {
        name.0
    }
}

/// Validated ring capacity in slots.
/// Must be a power of two so wraparound reduces to masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Capacity(usize);

impl Capacity {
    /// Create a new Capacity with validation.
    pub fn new(slots: usize) -> Result<Self, ConfigError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&slots) {
            return Err(ConfigError::InvalidField {
                field: "capacity",
                value: slots.to_string(),
                reason: format!("Capacity must be between {} and {}", MIN_CAPACITY, MAX_CAPACITY),
            });
        }

        if !slots.is_power_of_two() {
            return Err(ConfigError::InvalidField {
                field: "capacity",
                value: slots.to_string(),
                reason: "Capacity must be a power of two".to_string(),
            });
        }

        Ok(Self(slots))
    }

    /// Get the slot count.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Wraparound mask for cursor arithmetic.
    pub fn mask(&self) -> u64 {
        (self.0 - 1) as u64
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<usize> for Capacity {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for usize {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name_valid() {
        assert!(SegmentName::new("shmchan-demo").is_ok());
        assert!(SegmentName::new("ring_0").is_ok());
    }

    #[test]
    fn test_segment_name_rejects_empty() {
        assert!(SegmentName::new("").is_err());
    }

    #[test]
    fn test_segment_name_rejects_separators() {
        assert!(SegmentName::new("a/b").is_err());
        assert!(SegmentName::new("a b").is_err());
    }

    #[test]
    fn test_segment_name_rejects_overlong() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(SegmentName::new(long).is_err());
    }

    #[test]
    fn test_capacity_powers_of_two() {
        assert!(Capacity::new(2).is_ok());
        assert!(Capacity::new(1024).is_ok());
        assert_eq!(Capacity::new(1024).unwrap().mask(), 1023);
    }

    #[test]
    fn test_capacity_rejects_non_power_of_two() {
        assert!(Capacity::new(3).is_err());
        assert!(Capacity::new(1000).is_err());
    }

    #[test]
    fn test_capacity_rejects_out_of_range() {
        assert!(Capacity::new(0).is_err());
        assert!(Capacity::new(1).is_err());
        assert!(Capacity::new(MAX_CAPACITY * 2).is_err());
    }
}
