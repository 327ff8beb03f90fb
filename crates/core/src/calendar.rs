// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-local calendar math
//!
//! Ping times are wall-clock times in the user's zone. Resolution to an
//! absolute instant happens as late as possible so a time zone change
//! moves every pending ping with it.

use crate::error::CalendarError;
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest DST gap we step over (no zone currently skips more than 2h)
const MAX_GAP_MINUTES: i64 = 180;

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap move forward to the first valid minute after the gap.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return dt.with_timezone(&Utc);
    }

    let mut candidate = local;
    for _ in 0..MAX_GAP_MINUTES {
        candidate += TimeDelta::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
    }

    Utc.from_utc_datetime(&local)
}

/// Parse an IANA zone name such as `Europe/Moscow`
pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
}

/// Parse `HH:MM` (or `HH:MM:SS`)
pub fn parse_local_time(value: &str) -> Result<NaiveTime, CalendarError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| CalendarError::InvalidTime(value.to_string()))
}

#[cfg(test)]
#[path = "calendar_tests.rs"]
mod tests;
