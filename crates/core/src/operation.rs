// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log

use crate::analytics::AnalyticsEvent;
use crate::cycle::{CycleState, TodoItem};
use crate::timer::{Timer, TimerId, TimerPurpose};
use crate::user::{User, UserId};
use serde::{Deserialize, Serialize};

/// State changes that can be persisted to the WAL.
///
/// Operations carry whole records so replay never depends on the code
/// that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Create or replace a user
    UserUpsert { user: User },

    /// Write the user's active cycle
    CycleCommit { cycle: CycleState },

    /// Move a closed cycle from active to history
    CycleArchive { cycle: CycleState },

    /// Schedule a timer, replacing any pending one with the same purpose
    TimerSchedule { timer: Timer },

    /// Drop the pending timer with this purpose, if any
    TimerCancel {
        user_id: UserId,
        purpose: TimerPurpose,
    },

    /// Remove a timer that fired; a no-op if it was already replaced
    TimerConsume {
        user_id: UserId,
        purpose: TimerPurpose,
        timer_id: TimerId,
    },

    /// Replace the checklist items waiting for the user's next cycle
    TodosCarried {
        user_id: UserId,
        todos: Vec<TodoItem>,
    },

    /// Append to the analytics log
    EventLogged { event: AnalyticsEvent },
}

impl Operation {
    pub fn user_id(&self) -> &UserId {
        match self {
            Operation::UserUpsert { user } => &user.id,
            Operation::CycleCommit { cycle } | Operation::CycleArchive { cycle } => &cycle.user_id,
            Operation::TimerSchedule { timer } => &timer.user_id,
            Operation::TimerCancel { user_id, .. }
            | Operation::TimerConsume { user_id, .. }
            | Operation::TodosCarried { user_id, .. } => user_id,
            Operation::EventLogged { event } => &event.user_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::UserUpsert { .. } => "user_upsert",
            Operation::CycleCommit { .. } => "cycle_commit",
            Operation::CycleArchive { .. } => "cycle_archive",
            Operation::TimerSchedule { .. } => "timer_schedule",
            Operation::TimerCancel { .. } => "timer_cancel",
            Operation::TimerConsume { .. } => "timer_consume",
            Operation::TodosCarried { .. } => "todos_carried",
            Operation::EventLogged { .. } => "event_logged",
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
