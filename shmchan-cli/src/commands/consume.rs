// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmchan consume` command - Run the consumer role.

use std::time::Instant;

use shmchan_core::{ConfigLoader, Consumer, RingError};

pub fn execute(config_path: &str, quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let consumer = Consumer::attach(&config.channel, &config.backoff)?;

    tracing::info!(
        name = %config.channel.name,
        capacity = %config.channel.capacity,
        "Consumer attached"
    );

    let start = Instant::now();
    let mut received = 0u64;
    let mut out_of_order = 0u64;
    let mut last = 0u64;

    loop {
        match consumer.read() {
            Ok(value) => {
                if !quiet {
                    println!("Read {}", value);
                }
                if value != last + 1 {
                    out_of_order += 1;
                }
                last = value;
                received += 1;
            }
            Err(RingError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let elapsed = start.elapsed();
    let rate = received as f64 / elapsed.as_secs_f64();
    tracing::info!(
        received = received,
        out_of_order = out_of_order,
        elapsed_ms = elapsed.as_millis() as u64,
        rate_per_sec = rate as u64,
        "Consumer finished"
    );
    println!(
        "Read {} values in {:.2?} ({:.0} values/s), {} ordering gaps",
        received, elapsed, rate, out_of_order
    );

    Ok(())
}
