// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable timers
//!
//! A timer names *what* should happen for a user and *when*. At most one
//! timer is pending per `(user, purpose)`; scheduling replaces.

use crate::user::{User, UserId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scheduled timer instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub String);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TimerId {
    fn from(s: String) -> Self {
        TimerId(s)
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        TimerId(s.to_string())
    }
}

/// What a timer triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPurpose {
    MorningPing,
    #[serde(rename = "checkin_1")]
    Checkin1,
    #[serde(rename = "checkin_2")]
    Checkin2,
    EveningPing,
}

impl TimerPurpose {
    pub const ALL: [TimerPurpose; 4] = [
        TimerPurpose::MorningPing,
        TimerPurpose::Checkin1,
        TimerPurpose::Checkin2,
        TimerPurpose::EveningPing,
    ];

    /// Timers that belong to one day's cycle (everything except the morning ping)
    pub const CYCLE_BOUND: [TimerPurpose; 3] = [
        TimerPurpose::Checkin1,
        TimerPurpose::Checkin2,
        TimerPurpose::EveningPing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPurpose::MorningPing => "morning_ping",
            TimerPurpose::Checkin1 => "checkin_1",
            TimerPurpose::Checkin2 => "checkin_2",
            TimerPurpose::EveningPing => "evening_ping",
        }
    }
}

impl fmt::Display for TimerPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a timer is due.
///
/// Ping timers are wall-clock times in the user's zone and are resolved
/// against the zone the user has at comparison time. Check-ins are fixed
/// offsets from focus confirmation and therefore absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Due {
    Local(NaiveDateTime),
    At(DateTime<Utc>),
}

impl Due {
    pub fn resolve(&self, tz: &Tz) -> DateTime<Utc> {
        match self {
            Due::Local(local) => crate::calendar::resolve_local(tz, *local),
            Due::At(at) => *at,
        }
    }
}

/// A pending timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub user_id: UserId,
    pub purpose: TimerPurpose,
    pub due: Due,
    /// The cycle day this timer belongs to (for morning pings: the day it opens)
    pub cycle_date: NaiveDate,
    /// 1 for the first firing; evening reminders count up from 2
    pub attempt: u8,
}

impl Timer {
    pub fn new(
        id: impl Into<TimerId>,
        user_id: UserId,
        purpose: TimerPurpose,
        due: Due,
        cycle_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            user_id,
            purpose,
            due,
            cycle_date,
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u8) -> Self {
        self.attempt = attempt;
        self
    }

    /// Morning ping for the given date, at the user's configured local time
    pub fn morning(id: impl Into<TimerId>, user: &User, date: NaiveDate) -> Self {
        Self::new(
            id,
            user.id.clone(),
            TimerPurpose::MorningPing,
            Due::Local(user.morning_ping_on(date)),
            date,
        )
    }

    pub fn due_at(&self, user: &User) -> DateTime<Utc> {
        self.due.resolve(&user.timezone)
    }

    pub fn is_due(&self, user: &User, now: DateTime<Utc>) -> bool {
        self.due_at(user) <= now
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
