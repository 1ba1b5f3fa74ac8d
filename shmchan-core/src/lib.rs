//! shmchan Core Library
//!
//! Lock-free single-producer/single-consumer channel over named shared
//! memory. Provides the platform segment provider, the SPSC ring
//! engine, configuration parsing, and validated input types.

pub mod config;
pub mod error;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use config::{BackoffConfig, ChannelConfig, Config, ConfigLoader};
pub use error::{ConfigError, LayoutError, RingError, SegmentError, ShmChanError, ShmChanResult};
pub use shm::{Consumer, Producer, Segment};
pub use types::{Capacity, SegmentName};
