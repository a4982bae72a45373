//! Wall-clock and monotonic time sources

use crate::types::Ts;
use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Current UTC wall-clock time in nanoseconds since the UNIX epoch.
///
/// Stamped on every outbound confirmation and market-data frame.
#[must_use]
pub fn utc_now_ns() -> Ts {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ts::from_nanos(elapsed.as_secs() * 1_000_000_000 + u64::from(elapsed.subsec_nanos()))
}

/// Nanoseconds elapsed on the monotonic clock since process start.
///
/// Used for dt measurement; never jumps backwards.
#[must_use]
pub fn monotonic_ns() -> u64 {
    let elapsed = MONOTONIC_EPOCH.elapsed();
    elapsed.as_secs() * 1_000_000_000 + u64::from(elapsed.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_now_is_past_2020() {
        // 2020-01-01 in nanoseconds since the epoch
        assert!(utc_now_ns().as_nanos() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_monotonic_never_decreases() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(b >= a);
    }
}
