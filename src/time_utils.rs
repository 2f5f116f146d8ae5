// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Day arithmetic for cooldown windows.

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Whole days from `now` until `until`, rounded up. Zero if `until` has passed.
pub fn days_until_ceil(now: DateTime<Utc>, until: DateTime<Utc>) -> u32 {
    let secs = until.signed_duration_since(now).num_seconds();
    if secs <= 0 {
        return 0;
    }
    let days = (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_days_until_ceil() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(days_until_ceil(now, until), 16);

        // A partial day counts as a whole one
        let until = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 1).unwrap();
        assert_eq!(days_until_ceil(now, until), 1);

        assert_eq!(days_until_ceil(until, now), 0);
        assert_eq!(days_until_ceil(now, now), 0);
    }
}
