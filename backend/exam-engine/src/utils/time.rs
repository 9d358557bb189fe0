use chrono::{DateTime, Utc};
use std::time::Duration;

/// Rounds to the nearest whole second, halves rounding up.
pub fn round_to_seconds(duration: Duration) -> u64 {
    (duration.as_millis() as u64 + 500) / 1000
}

/// Whole seconds left, rounded up so a countdown shows 1 until it is really 0.
pub fn ceil_seconds(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    millis.div_ceil(1000)
}

/// Wall-clock instant `offset` from `now`, saturating on overflow.
pub fn wall_clock_after(now: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(offset)
        .ok()
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
