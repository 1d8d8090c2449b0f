//! Wall-clock helper.

use chrono::Utc;

/// Current UTC time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
