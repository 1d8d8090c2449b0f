//! Demo-side collaborators of the engine.
//!
//! - `console_subscriber`: prints every published record.
//! - `price_feed`: random-walk price source producing `MarketDataRecord`s.

pub mod console_subscriber;
pub mod price_feed;
