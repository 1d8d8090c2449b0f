//! Command-line arguments for the throttler demo.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of generated symbols (`TEST0`, `TEST1`, ...) when no symbols file is given.
    #[clap(long, default_value_t = 150)]
    pub symbols: usize,

    /// Path to a text file with symbols to load.
    /// Symbols may be separated by commas, spaces, or new lines.
    #[clap(long)]
    pub symbols_file: Option<PathBuf>,

    /// JSON file with throttle settings; flags below override it.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Maximum publishes per slot.
    #[clap(long)]
    pub max_per_slot: Option<u32>,

    /// Slot duration in milliseconds.
    #[clap(long)]
    pub slot_ms: Option<u64>,

    /// How long to feed updates, in seconds.
    #[clap(long, default_value_t = 10)]
    pub duration_secs: u64,

    /// Upper bound of the random pause between two updates, in milliseconds.
    #[clap(long, default_value_t = 100)]
    pub max_jitter_ms: u64,

    /// Number of console subscribers to register.
    #[clap(long, default_value_t = 1)]
    pub subscribers: usize,
}
