//!
//! Common types and utilities shared by the throttling engine and its callers.
//!
//! This crate aggregates:
//! - `error`: unified error type `ThrottleError` used across the workspace.
//! - `result`: handy `Result<T, ThrottleError>` alias.
//! - `record`: the immutable `MarketDataRecord` and its timestamp sentinels.
//! - `symbols`: symbol list parsing and generation.
//! - `clock`: wall-clock milliseconds used for update and publish stamps.
#![warn(missing_docs)]
pub mod clock;
pub mod error;
pub mod record;
pub mod result;
pub mod symbols;

pub use error::{RejectReason, ThrottleError};
pub use record::MarketDataRecord;
pub use result::Result;
