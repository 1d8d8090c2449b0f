//! Error types shared between the throttling engine and its callers.
//!
//! The `ThrottleError` enum unifies lifecycle violations, rejected ingest updates,
//! subscriber delivery failures, configuration problems and the usual I/O and
//! serialization failures, allowing crates to propagate a single error type.
use std::io;
use std::sync::PoisonError;

use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Why the cache refused to take an incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RejectReason {
    /// The incoming update time is strictly older than the cached one.
    Stale,
    /// Every compare-and-swap attempt lost against a concurrent writer.
    Contention,
}

/// Unified error type shared by the engine and the demo binary.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// A pre-start-only operation was invoked after the engine was started.
    #[error("the instance is started")]
    AlreadyStarted,

    /// Ingest was attempted while the engine is not running.
    #[error("the instance is not started")]
    NotStarted,

    /// The supplied value did not take effect in the cache.
    #[error("data not updated for {symbol}: {reason}")]
    DataNotUpdated {
        /// Symbol of the rejected update.
        symbol: String,
        /// Stale timestamp or lost compare-and-swap race.
        reason: RejectReason,
    },

    /// Ingest record carried an empty symbol.
    #[error("market data record has an empty symbol")]
    EmptySymbol,

    /// A subscriber failed to handle a published record.
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// Invalid throttle configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Error while parsing a symbols file.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// I/O error originating from the standard library, files or thread spawning.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for ThrottleError {
    fn from(err: PoisonError<T>) -> Self {
        ThrottleError::MutexLock(err.to_string())
    }
}

impl ThrottleError {
    /// Convenience constructor for a rejected ingest update.
    pub fn data_not_updated(symbol: &str, reason: RejectReason) -> Self {
        ThrottleError::DataNotUpdated {
            symbol: symbol.to_string(),
            reason,
        }
    }
}
