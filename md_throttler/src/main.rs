//! Market data throttler demo.
//!
//! This binary wires the engine to a synthetic feed and prints whatever the engine
//! publishes. It mirrors a production process in miniature:
//!
//! - symbols are generated (`TEST0..TESTn`) or read from `--symbols-file`;
//! - one or more `ConsoleSubscriber`s are registered before start;
//! - `PriceFeed` produces one update per symbol per round, and each update is sent
//!   through `on_message` followed by a random pause of up to `--max-jitter-ms`;
//! - after `--duration-secs` (or Ctrl+C) the engine is stopped.
//!
//! Throttle settings come from `--config` (JSON) with `--max-per-slot` and
//! `--slot-ms` overriding individual fields.
//!
//! Usage example (CLI):
//! ```bash
//! md_throttler --symbols 150 --max-per-slot 100 --slot-ms 1000 --duration-secs 10
//! ```
#![warn(missing_docs)]
mod args;
mod model;

use crate::args::Args;
use crate::model::console_subscriber::ConsoleSubscriber;
use crate::model::price_feed::PriceFeed;
use clap::Parser;
use log::{error, info, warn};
use md_common::symbols::{SymbolList, SymbolParser, generate_symbols};
use md_common::{Result, ThrottleError};
use md_throttler::{MarketDataThrottler, ThrottleConfig};
use rand::Rng;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Ctrl+C received. Stopping feed...");
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Ctrl+C handler not installed: {}", e);
        }
    }

    let config = load_config(&args)?;
    let symbols = load_symbols(&args)?;
    info!("Symbols: {}", symbols.len());

    let engine = MarketDataThrottler::new(config)?;
    engine.initialize(&symbols)?;
    for id in 0..args.subscribers {
        engine.register_subscriber(Arc::new(ConsoleSubscriber::new(id)))?;
    }
    engine.start()?;

    run_feed(&engine, &symbols, &args, &shutdown);

    engine.stop();
    info!("Demo finished");
    Ok(())
}

/// Feed random-walk updates until the duration elapses or shutdown is requested.
fn run_feed(engine: &MarketDataThrottler, symbols: &[String], args: &Args, shutdown: &AtomicBool) {
    let duration = Duration::from_secs(args.duration_secs);
    let mut feed = PriceFeed::new(symbols);
    let mut rng = rand::rng();
    let started = Instant::now();
    let mut rejected = 0_u64;

    while started.elapsed() <= duration && !shutdown.load(Ordering::Relaxed) {
        for record in feed.next_round() {
            match engine.on_message(&record) {
                Ok(_) => {}
                Err(ThrottleError::DataNotUpdated { .. }) => rejected += 1,
                Err(e) => {
                    error!("Ingest failed: {}", e);
                    return;
                }
            }
            if args.max_jitter_ms > 0 {
                thread::sleep(Duration::from_millis(rng.random_range(0..args.max_jitter_ms)));
            }
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
        }
    }
    info!(
        "Feed done after {:?}; {} update(s) rejected",
        started.elapsed(),
        rejected
    );
}

fn load_config(args: &Args) -> Result<ThrottleConfig> {
    let mut config = match &args.config {
        Some(path) => ThrottleConfig::from_json_file(path)?,
        None => ThrottleConfig::default(),
    };
    if let Some(max) = args.max_per_slot {
        config.max_publish_per_slot = max;
    }
    if let Some(slot_ms) = args.slot_ms {
        config.slot_duration_ms = slot_ms;
    }
    config.validate()?;
    Ok(config)
}

fn load_symbols(args: &Args) -> Result<Vec<String>> {
    match &args.symbols_file {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            let symbols = SymbolList::parse_from_reader(reader)?;
            if symbols.is_empty() {
                return Err(ThrottleError::ParseSymbolsFile(format!(
                    "no symbols in {}",
                    path.display()
                )));
            }
            Ok(symbols)
        }
        None => Ok(generate_symbols("TEST", args.symbols)),
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
