// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle timing and behavior knobs
//!
//! Loaded from the `[cycle]` table of the daemon's TOML settings; every
//! field has a default so an empty table is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to check-ins still pending when the evening prompt goes out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateCheckinPolicy {
    /// Cancel them; a late firing is a no-op
    #[default]
    Skip,
    /// Keep them; a late prompt is sent without changing the stage
    Deliver,
}

/// Offset of an evening reminder from the evening ping time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderOffset(#[serde(with = "humantime_serde")] pub Duration);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// First check-in, measured from focus confirmation
    #[serde(with = "humantime_serde")]
    pub checkin_1_after: Duration,
    /// Second check-in, measured from focus confirmation
    #[serde(with = "humantime_serde")]
    pub checkin_2_after: Duration,
    /// Reminder offsets after the evening ping while no report arrives
    pub evening_reminders: Vec<ReminderOffset>,
    pub late_checkins: LateCheckinPolicy,
    /// Minimum length of a typed dump (voice dumps only need to be non-empty)
    pub min_dump_chars: usize,
    /// How long a timer waits when it fires during a deeper session
    #[serde(with = "humantime_serde")]
    pub deeper_defer: Duration,
    /// A deeper session silent for this long is abandoned when a timer needs the cycle
    #[serde(with = "humantime_serde")]
    pub deeper_idle_timeout: Duration,
    /// Messages that end a deeper session (compared case-insensitively)
    pub deeper_exit_words: Vec<String>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            checkin_1_after: Duration::from_secs(3 * 3600),
            checkin_2_after: Duration::from_secs(6 * 3600),
            evening_reminders: vec![
                ReminderOffset(Duration::from_secs(30 * 60)),
                ReminderOffset(Duration::from_secs(90 * 60)),
            ],
            late_checkins: LateCheckinPolicy::Skip,
            min_dump_chars: 10,
            deeper_defer: Duration::from_secs(5 * 60),
            deeper_idle_timeout: Duration::from_secs(30 * 60),
            deeper_exit_words: ["done", "готово", "стоп", "хватит"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl CycleConfig {
    pub fn is_exit_word(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        self.deeper_exit_words
            .iter()
            .any(|w| w.to_lowercase() == text)
    }

    /// Offset of the reminder that follows the given evening attempt, if any
    pub fn reminder_after(&self, attempt: u8) -> Option<Duration> {
        let index = usize::from(attempt).checked_sub(1)?;
        self.evening_reminders.get(index).map(|r| r.0)
    }

    /// One-line summary for startup logs
    pub fn summary(&self) -> String {
        let reminders: Vec<String> = self
            .evening_reminders
            .iter()
            .map(|r| humantime::format_duration(r.0).to_string())
            .collect();
        format!(
            "checkins +{} / +{}, evening reminders [{}], late checkins {:?}",
            humantime::format_duration(self.checkin_1_after),
            humantime::format_duration(self.checkin_2_after),
            reminders.join(", "),
            self.late_checkins,
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
