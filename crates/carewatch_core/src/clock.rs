//! Wall-clock helper shared by sync and user actions.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in epoch milliseconds. Clamps to 0 if the clock is set
/// before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
