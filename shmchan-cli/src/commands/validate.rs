// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmchan validate` command - Validate configuration file.

use shmchan_core::{shm, ConfigLoader};

pub fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Channel Settings:");
            println!("  Name:         {}", config.channel.name);
            println!("  Capacity:     {} slots", config.channel.capacity);
            println!(
                "  Segment Size: {} bytes",
                shm::segment_size(config.channel.capacity)
            );
            println!();
            println!("Backoff Settings:");
            println!("  Full-wait spin:  {:?}", config.backoff.full_spin);
            println!("  Empty-wait spin: {:?}", config.backoff.empty_spin);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
