//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `ThrottleError`, so functions can simply return `Result<T>`.
use crate::error::ThrottleError;

/// Workspace-wide `Result` alias with `ThrottleError` as the default error.
pub type Result<T, E = ThrottleError> = std::result::Result<T, E>;
