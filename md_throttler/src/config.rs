//! Throttle configuration.
//!
//! All knobs have defaults matching the classic "100 publishes per second" setup, so
//! `ThrottleConfig::default()` is a valid configuration. A JSON file may override any
//! subset of the fields:
//!
//! ```json
//! { "max_publish_per_slot": 50, "slot_duration_ms": 500 }
//! ```

use md_common::{Result, ThrottleError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Default cap of publishes per slot.
pub const DEFAULT_MAX_PUBLISH_PER_SLOT: u32 = 100;
/// Default slot length in milliseconds.
pub const DEFAULT_SLOT_DURATION_MS: u64 = 1000;
/// Default controller idle wait on an empty queue, in milliseconds.
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 5;

/// Rate limiting and queue sizing options for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Maximum number of records published within one slot.
    pub max_publish_per_slot: u32,
    /// Length of a rate limiting slot.
    pub slot_duration_ms: u64,
    /// Publish queue capacity; `None` sizes the queue to the loaded symbol count.
    pub queue_capacity: Option<usize>,
    /// How long the controller waits for work before re-checking its state.
    pub idle_backoff_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_publish_per_slot: DEFAULT_MAX_PUBLISH_PER_SLOT,
            slot_duration_ms: DEFAULT_SLOT_DURATION_MS,
            queue_capacity: None,
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
        }
    }
}

impl ThrottleConfig {
    /// Load a configuration from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: ThrottleConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would stall or never throttle.
    pub fn validate(&self) -> Result<()> {
        if self.max_publish_per_slot == 0 {
            return Err(ThrottleError::Config(
                "max_publish_per_slot must be greater than zero".to_string(),
            ));
        }
        if self.slot_duration_ms == 0 {
            return Err(ThrottleError::Config(
                "slot_duration_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(ThrottleError::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Slot length as a `Duration`.
    pub fn slot_duration(&self) -> Duration {
        Duration::from_millis(self.slot_duration_ms)
    }

    /// Idle wait as a `Duration`.
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Queue capacity for a universe of `symbol_count` symbols.
    pub fn queue_capacity_for(&self, symbol_count: usize) -> usize {
        self.queue_capacity.unwrap_or(symbol_count).max(1)
    }
}
