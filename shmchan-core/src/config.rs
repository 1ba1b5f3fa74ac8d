// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Validates channel and backoff settings at startup. Any invalid field
//! results in a ConfigError that prevents the channel from attaching.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ShmChanError, ShmChanResult};
use crate::types::{Capacity, SegmentName};

/// Upper bound on a spin quantum. Anything longer than this almost
/// certainly means the value was written in the wrong unit.
const MAX_SPIN_US: u64 = 1_000_000;

/// Raw channel section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChannelConfig {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_name() -> String {
    "shmchan-demo".to_string()
}

fn default_capacity() -> usize {
    1024
}

impl Default for RawChannelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
        }
    }
}

/// Raw backoff section. Spin quanta are microseconds in the file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBackoffConfig {
    #[serde(default = "default_full_spin_us")]
    full_spin_us: u64,
    #[serde(default = "default_empty_spin_us")]
    empty_spin_us: u64,
}

fn default_full_spin_us() -> u64 {
    5 // producers can usually afford to wait
}

fn default_empty_spin_us() -> u64 {
    1 // keep consumer wake-up latency minimal
}

impl Default for RawBackoffConfig {
    fn default() -> Self {
        Self {
            full_spin_us: default_full_spin_us(),
            empty_spin_us: default_empty_spin_us(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    channel: RawChannelConfig,
    #[serde(default)]
    backoff: RawBackoffConfig,
}

/// Validated channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub name: SegmentName,
    pub capacity: Capacity,
}

/// Validated backoff configuration.
///
/// The full-wait quantum applies to a producer spinning on a full ring,
/// the empty-wait quantum to a consumer spinning on an empty one.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub full_spin: Duration,
    pub empty_spin: Duration,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub backoff: BackoffConfig,
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default()
            .validate()
            .expect("built-in defaults must validate")
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let name = SegmentName::new(self.channel.name)?;
        let capacity = Capacity::new(self.channel.capacity)?;

        let full_spin = validate_spin("full_spin_us", self.backoff.full_spin_us)?;
        let empty_spin = validate_spin("empty_spin_us", self.backoff.empty_spin_us)?;

        Ok(Config {
            channel: ChannelConfig { name, capacity },
            backoff: BackoffConfig {
                full_spin,
                empty_spin,
            },
        })
    }
}

fn validate_spin(field: &'static str, us: u64) -> Result<Duration, ConfigError> {
    if us > MAX_SPIN_US {
        return Err(ConfigError::InvalidField {
            field,
            value: us.to_string(),
            reason: format!("Spin quantum exceeds {}us; expected microseconds", MAX_SPIN_US),
        });
    }
    Ok(Duration::from_micros(us))
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    /// Returns ConfigError for a missing file or any invalid field.
    pub fn load_file(path: impl AsRef<Path>) -> ShmChanResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ShmChanError::Config(ConfigError::NotFound {
                path: path.to_path_buf(),
            }));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShmChanError::Config(ConfigError::Parse {
                message: format!("Failed to read {}: {}", path.display(), e),
            })
        })?;

        let raw: RawConfig = serde_yaml::from_str(&contents).map_err(|e| {
            ShmChanError::Config(ConfigError::Parse {
                message: e.to_string(),
            })
        })?;

        let config = raw.validate()?;
        tracing::debug!(path = %path.display(), name = %config.channel.name, "Loaded configuration");
        Ok(config)
    }

    /// Load a config file if it exists, falling back to built-in defaults.
    /// A file that exists but fails validation is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> ShmChanResult<Config> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Config::default())
        }
    }
}
