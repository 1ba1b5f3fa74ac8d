//! Custom error types for shmchan.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the shmchan library.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum ShmChanError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // Segment Lifecycle Errors - No Fallback Backing Store
    // =========================================================================
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    // =========================================================================
    // Layout Validation Errors - Detected at Attach, Never at Runtime
    // =========================================================================
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    // =========================================================================
    // Ring Protocol Errors
    // =========================================================================
    #[error("Ring error: {0}")]
    Ring(#[from] RingError),
}

/// Configuration errors cause immediate process termination.
/// Used when the config file is invalid and the channel cannot safely start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Segment lifecycle errors - creation, mapping, or disposal of the
/// named backing region failed. Fatal to the caller's setup path.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Failed to create segment: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Segment already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Failed to open segment: {name} - {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to map segment: {reason}")]
    MapFailed { reason: String },

    #[error("Segment size mismatch: expected {expected} bytes, backing holds {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Failed to destroy segment: {name} - {reason}")]
    DestroyFailed { name: String, reason: String },
}

/// Layout validation errors - the opened segment does not carry the
/// header this build expects. Always a deployment error, never retried.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Segment header magic mismatch: found {found:#018x}")]
    BadMagic { found: u64 },

    #[error("Segment layout tag mismatch: expected {expected:#010x}, found {found:#010x}")]
    TagMismatch { expected: u32, found: u32 },

    #[error("Segment capacity mismatch: this build expects {expected}, segment holds {actual}")]
    CapacityMismatch { expected: u64, actual: u64 },

    #[error("Timed out waiting for segment creator to finish initialization")]
    InitTimeout,
}

/// Ring protocol errors surfaced to producer/consumer callers.
#[derive(Debug, Error)]
pub enum RingError {
    #[error("{role} role already claimed by pid {pid}")]
    RoleClaimed { role: &'static str, pid: u64 },

    #[error("Channel closed by producer")]
    Closed,

    #[error("Operation timed out after {waited:?}")]
    Timeout { waited: Duration },
}

/// Result type alias using ShmChanError.
pub type ShmChanResult<T> = Result<T, ShmChanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_error_display() {
        let err = SegmentError::CreateFailed {
            name: "demo".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("demo"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_layout_error_display() {
        let err = LayoutError::CapacityMismatch {
            expected: 1024,
            actual: 4096,
        };
        assert!(err.to_string().contains("1024"));
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn test_error_chain() {
        let ring_err = RingError::RoleClaimed {
            role: "producer",
            pid: 4242,
        };
        let top: ShmChanError = ring_err.into();
        assert!(matches!(top, ShmChanError::Ring(_)));
        assert!(top.to_string().contains("4242"));
    }
}
