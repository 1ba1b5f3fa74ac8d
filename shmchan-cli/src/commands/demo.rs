// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmchan demo` command - Both roles in one process, fixed duration.
//!
//! Spins up a producer thread writing monotonically increasing values
//! and a consumer thread draining them, runs for a fixed wall-clock
//! duration, then closes, joins, and destroys the segment.

use std::thread;
use std::time::{Duration, Instant};

use shmchan_core::{ConfigLoader, Consumer, Producer, RingError, Segment};

pub fn execute(
    config_path: &str,
    duration: u64,
    pin: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let run_for = Duration::from_secs(duration);

    let producer = Producer::attach(&config.channel, &config.backoff)?;
    let consumer = Consumer::attach(&config.channel, &config.backoff)?;

    tracing::info!(
        name = %config.channel.name,
        capacity = %config.channel.capacity,
        duration_s = duration,
        "Demo starting"
    );

    let cores = role_cores(pin);

    let writer = thread::spawn(move || {
        if let Some((producer_core, _)) = cores {
            pin_role(producer_core, "producer");
        }
        let start = Instant::now();
        let mut written = 0u64;
        while start.elapsed() < run_for {
            if producer.write(written + 1).is_err() {
                break;
            }
            written += 1;
        }
        producer.close();
        written
    });

    let reader = thread::spawn(move || {
        if let Some((_, consumer_core)) = cores {
            pin_role(consumer_core, "consumer");
        }
        let mut received = 0u64;
        let mut out_of_order = 0u64;
        let mut last = 0u64;
        loop {
            match consumer.read() {
                Ok(value) => {
                    if value != last + 1 {
                        out_of_order += 1;
                    }
                    last = value;
                    received += 1;
                }
                Err(RingError::Closed) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Consumer stopped early");
                    break;
                }
            }
        }
        (received, out_of_order)
    });

    let written = writer.join().expect("producer thread panicked");
    let (received, out_of_order) = reader.join().expect("consumer thread panicked");

    let rate = received as f64 / run_for.as_secs_f64();
    println!("Demo finished after {:?}:", run_for);
    println!("  written:  {}", written);
    println!("  received: {}", received);
    println!("  rate:     {:.0} values/s", rate);
    println!("  ordering gaps: {}", out_of_order);

    if written != received {
        tracing::warn!(
            written = written,
            received = received,
            "Write/read counts diverge"
        );
    }

    Segment::destroy(&config.channel.name)?;
    Ok(())
}

/// Pick one core per role when pinning is requested and the machine has
/// at least two to give.
#[cfg(unix)]
fn role_cores(pin: bool) -> Option<(usize, usize)> {
    if !pin {
        return None;
    }
    let available = num_cpus::get();
    if available < 2 {
        tracing::warn!(available = available, "Not enough CPUs to pin both roles");
        return None;
    }
    Some((0, 1))
}

#[cfg(not(unix))]
fn role_cores(pin: bool) -> Option<(usize, usize)> {
    if pin {
        tracing::warn!("CPU pinning is not supported on this platform");
    }
    None
}

#[cfg(unix)]
fn pin_role(core: usize, role: &str) {
    if let Err(e) = crate::cpu_affinity::pin_current_thread(core) {
        tracing::warn!(core = core, role = role, error = %e, "Failed to pin role");
    }
}

#[cfg(not(unix))]
fn pin_role(_core: usize, _role: &str) {}
