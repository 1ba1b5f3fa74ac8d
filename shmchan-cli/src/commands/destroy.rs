// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmchan destroy` command - Remove the channel's backing segment.

use shmchan_core::{ConfigLoader, Segment};

pub fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;

    Segment::destroy(&config.channel.name)?;
    println!("✓ Segment '{}' destroyed", config.channel.name);
    Ok(())
}
