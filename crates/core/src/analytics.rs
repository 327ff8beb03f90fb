// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Product analytics: what users did and when
//!
//! Events are committed with the state change they describe, so the log
//! never reports something that was rolled back.

use crate::cycle::CycleId;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserRegistered,
    DumpCreated,
    FocusSelected,
    CheckinDone,
    EveningReportDone,
    DeeperStarted,
    DeeperCompleted,
    TodosAdded,
    TodoDone,
    TodoCarried,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserRegistered => "user_registered",
            EventKind::DumpCreated => "dump_created",
            EventKind::FocusSelected => "focus_selected",
            EventKind::CheckinDone => "checkin_done",
            EventKind::EveningReportDone => "evening_report_done",
            EventKind::DeeperStarted => "deeper_started",
            EventKind::DeeperCompleted => "deeper_completed",
            EventKind::TodosAdded => "todos_added",
            EventKind::TodoDone => "todo_done",
            EventKind::TodoCarried => "todo_carried",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub user_id: UserId,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub cycle_id: Option<CycleId>,
    /// Small string details, e.g. `energy` or `status`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl AnalyticsEvent {
    pub fn new(user_id: UserId, kind: EventKind, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            kind,
            at,
            cycle_id: None,
            data: BTreeMap::new(),
        }
    }

    pub fn with_cycle(mut self, cycle_id: Option<CycleId>) -> Self {
        self.cycle_id = cycle_id;
        self
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
