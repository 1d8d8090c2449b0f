//! Market data record and its timestamp sentinels.
//!
//! A `MarketDataRecord` is the immutable value the engine caches per symbol and hands
//! to subscribers. Changing a price or stamping a publish time always produces a new
//! record; the old one stays valid for whoever still holds it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `update_time` of a record that was loaded but never updated.
pub const UPDATE_TIME_JUST_LOADED: i64 = -1;
/// `publish_time` of a record that has not been published since its last update.
pub const PUBLISH_TIME_UNPUBLISHED: i64 = -1;

/// Latest known state of a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataRecord {
    /// Symbol identifier.
    pub symbol: String,
    /// Last price; `NaN` until the first real update.
    pub price: f64,
    /// Producer-assigned timestamp in milliseconds.
    pub update_time: i64,
    /// Time the engine published this value, in milliseconds.
    pub publish_time: i64,
}

impl MarketDataRecord {
    /// Create an unpublished record, as produced by a feed.
    pub fn new(symbol: impl Into<String>, price: f64, update_time: i64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            update_time,
            publish_time: PUBLISH_TIME_UNPUBLISHED,
        }
    }

    /// Placeholder record held by the cache right after a symbol is loaded.
    pub fn just_loaded(symbol: impl Into<String>) -> Self {
        Self::new(symbol, f64::NAN, UPDATE_TIME_JUST_LOADED)
    }

    /// Copy of this record stamped with `publish_time`.
    pub fn published_at(&self, publish_time: i64) -> Self {
        Self {
            publish_time,
            ..self.clone()
        }
    }

    /// Copy of this record carrying a new value; the copy needs republishing.
    pub fn updated(&self, price: f64, update_time: i64) -> Self {
        Self::new(self.symbol.clone(), price, update_time)
    }

    /// The record has never received a real update.
    pub fn is_just_loaded(&self) -> bool {
        self.update_time == UPDATE_TIME_JUST_LOADED
    }

    /// The current value has been published.
    pub fn is_published(&self) -> bool {
        self.publish_time != PUBLISH_TIME_UNPUBLISHED
    }

    /// A real update is waiting to be published.
    pub fn is_publish_pending(&self) -> bool {
        !self.is_published() && !self.is_just_loaded()
    }
}

impl fmt::Display for MarketDataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.symbol, self.price, self.update_time, self.publish_time
        )
    }
}
