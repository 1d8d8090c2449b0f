//! Market data throttler.
//!
//! Ingests per-symbol price updates, keeps the latest value per symbol in a lock-free
//! cache and republishes changes to subscribers at a bounded rate. Bursts for the same
//! symbol coalesce: a subscriber receives at most `max_publish_per_slot` records per
//! slot, each carrying the freshest cached value at publish time.
//!
//! Building blocks, leaf first:
//! - `cache`: `SymbolCache`, one compare-and-swap slot per symbol.
//! - `queue`: `PublishQueue`, bounded FIFO of symbols waiting to publish.
//! - `controller`: `ThrottleController` drain loop and its `SlotLimiter`.
//! - `dispatcher`: `Dispatcher`, one worker per subscriber.
//! - `subscriber`: the `Subscriber` capability.
//! - `lifecycle`: `NotStarted -> Started -> Stopped` flag.
//! - `config`: `ThrottleConfig` knobs.
//! - `engine`: `MarketDataThrottler`, the composition root.
#![warn(missing_docs)]
pub mod cache;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod lifecycle;
pub mod queue;
pub mod subscriber;

pub use config::ThrottleConfig;
pub use engine::{IngestOutcome, MarketDataThrottler};
pub use lifecycle::LifecycleState;
pub use subscriber::Subscriber;
