// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmchan produce` command - Run the producer role.

use std::time::{Duration, Instant};

use shmchan_core::{ConfigLoader, Producer};

pub fn execute(
    config_path: &str,
    count: Option<u64>,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let producer = Producer::attach(&config.channel, &config.backoff)?;

    tracing::info!(
        name = %config.channel.name,
        capacity = %config.channel.capacity,
        "Producer attached"
    );

    let limit = duration.map(Duration::from_secs);
    let start = Instant::now();
    let mut value = 0u64;

    loop {
        if let Some(count) = count {
            if value >= count {
                break;
            }
        }
        if let Some(limit) = limit {
            if start.elapsed() >= limit {
                break;
            }
        }

        value += 1;
        producer.write(value)?;
    }

    producer.close();

    let elapsed = start.elapsed();
    let rate = value as f64 / elapsed.as_secs_f64();
    tracing::info!(
        written = value,
        elapsed_ms = elapsed.as_millis() as u64,
        rate_per_sec = rate as u64,
        "Producer finished"
    );
    println!("Wrote {} values in {:.2?} ({:.0} values/s)", value, elapsed, rate);

    Ok(())
}
