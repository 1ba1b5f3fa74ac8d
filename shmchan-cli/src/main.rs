// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmchan CLI
//!
//! Command-line interface and demo harness for the shmchan channel.

use clap::{Parser, Subcommand};

mod commands;
#[cfg(unix)]
mod cpu_affinity;

/// shmchan - lock-free cross-process SPSC channel over shared memory
#[derive(Parser)]
#[command(name = "shmchan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "shmchan.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the producer role: write monotonically increasing values
    Produce {
        /// Stop after writing this many values (default: run until killed)
        #[arg(short = 'n', long, conflicts_with = "duration")]
        count: Option<u64>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Run the consumer role: read and report values until end-of-stream
    Consume {
        /// Suppress per-value output, report only the summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run both roles on two threads for a fixed wall-clock duration
    Demo {
        /// Run time in seconds
        #[arg(short, long, default_value_t = 2)]
        duration: u64,

        /// Pin each role to its own CPU core
        #[arg(long)]
        pin: bool,
    },

    /// Remove the channel's backing segment
    Destroy,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Produce { count, duration } => {
            commands::produce::execute(&cli.config, count, duration)
        }
        Commands::Consume { quiet } => commands::consume::execute(&cli.config, quiet),
        Commands::Demo { duration, pin } => commands::demo::execute(&cli.config, duration, pin),
        Commands::Destroy => commands::destroy::execute(&cli.config),
        Commands::Validate { file } => commands::validate::execute(&file),
    }
}
