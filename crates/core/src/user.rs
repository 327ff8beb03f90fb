// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Users and their local-time settings

use crate::calendar::resolve_local;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a user (the messaging platform's chat id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// Coaching tone chosen at onboarding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Soft,
    Strict,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Soft => "soft",
            Tone::Strict => "strict",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Tone::Neutral),
            "soft" => Ok(Tone::Soft),
            "strict" => Ok(Tone::Strict),
            other => Err(format!("unknown tone: {}", other)),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub timezone: Tz,
    pub morning_ping: NaiveTime,
    pub evening_ping: NaiveTime,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub life_areas: Vec<String>,
    #[serde(default)]
    pub weekly_focus: Option<String>,
    #[serde(default)]
    pub monthly_focus: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The user's calendar date at the given instant
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.timezone).naive_local()
    }

    pub fn morning_ping_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.morning_ping)
    }

    pub fn evening_ping_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.evening_ping)
    }

    /// Resolve a local wall-clock time in this user's current zone
    pub fn resolve(&self, local: NaiveDateTime) -> DateTime<Utc> {
        resolve_local(&self.timezone, local)
    }

    /// Start of the given local day (local midnight, or the first valid minute after it)
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.resolve(date.and_time(NaiveTime::MIN))
    }

    /// First date whose morning ping lies strictly after `now`
    pub fn next_morning_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = self.local_date(now);
        if self.resolve(self.morning_ping_on(today)) > now {
            today
        } else {
            today.succ_opt().unwrap_or(today)
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
