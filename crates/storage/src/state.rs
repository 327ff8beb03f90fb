// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state rebuilt from WAL operations

use chrono::{DateTime, Utc};
use dl_core::{AnalyticsEvent, CycleState, Operation, Timer, TimerPurpose, TodoItem, User, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Analytics events kept per user; the oldest are dropped first
pub const MAX_EVENTS_PER_USER: usize = 1000;

/// Everything the daemon knows, as of the last applied operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterializedState {
    #[serde(default)]
    pub users: BTreeMap<UserId, User>,
    /// At most one active cycle per user
    #[serde(default)]
    pub active: BTreeMap<UserId, CycleState>,
    /// Closed cycles, oldest first
    #[serde(default)]
    pub history: BTreeMap<UserId, Vec<CycleState>>,
    /// At most one pending timer per (user, purpose)
    #[serde(default)]
    pub timers: BTreeMap<UserId, BTreeMap<TimerPurpose, Timer>>,
    /// Checklist items waiting for the user's next cycle
    #[serde(default)]
    pub carryover: BTreeMap<UserId, Vec<TodoItem>>,
    /// Analytics log, oldest first
    #[serde(default)]
    pub events: BTreeMap<UserId, Vec<AnalyticsEvent>>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation.
    ///
    /// Every operation is idempotent so a replayed entry leaves the state
    /// unchanged.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::UserUpsert { user } => {
                self.users.insert(user.id.clone(), user.clone());
            }
            Operation::CycleCommit { cycle } => {
                self.active.insert(cycle.user_id.clone(), cycle.clone());
            }
            Operation::CycleArchive { cycle } => {
                if self
                    .active
                    .get(&cycle.user_id)
                    .is_some_and(|active| active.id == cycle.id)
                {
                    self.active.remove(&cycle.user_id);
                }
                let history = self.history.entry(cycle.user_id.clone()).or_default();
                if !history.iter().any(|c| c.id == cycle.id) {
                    history.push(cycle.clone());
                }
            }
            Operation::TimerSchedule { timer } => {
                self.timers
                    .entry(timer.user_id.clone())
                    .or_default()
                    .insert(timer.purpose, timer.clone());
            }
            Operation::TimerCancel { user_id, purpose } => {
                self.remove_timer(user_id, *purpose, |_| true);
            }
            Operation::TimerConsume {
                user_id,
                purpose,
                timer_id,
            } => {
                self.remove_timer(user_id, *purpose, |t| &t.id == timer_id);
            }
            Operation::TodosCarried { user_id, todos } => {
                if todos.is_empty() {
                    self.carryover.remove(user_id);
                } else {
                    self.carryover.insert(user_id.clone(), todos.clone());
                }
            }
            Operation::EventLogged { event } => {
                let events = self.events.entry(event.user_id.clone()).or_default();
                if !events.contains(event) {
                    events.push(event.clone());
                    let excess = events.len().saturating_sub(MAX_EVENTS_PER_USER);
                    events.drain(..excess);
                }
            }
        }
    }

    fn remove_timer(
        &mut self,
        user_id: &UserId,
        purpose: TimerPurpose,
        matches: impl Fn(&Timer) -> bool,
    ) {
        if let Some(timers) = self.timers.get_mut(user_id) {
            if timers.get(&purpose).is_some_and(matches) {
                timers.remove(&purpose);
            }
            if timers.is_empty() {
                self.timers.remove(user_id);
            }
        }
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn active_cycle(&self, id: &UserId) -> Option<&CycleState> {
        self.active.get(id)
    }

    pub fn history(&self, id: &UserId) -> &[CycleState] {
        self.history.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn carryover(&self, id: &UserId) -> &[TodoItem] {
        self.carryover.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The user's most recent `limit` analytics events, oldest first
    pub fn events(&self, id: &UserId, limit: usize) -> &[AnalyticsEvent] {
        let events = self.events.get(id).map(Vec::as_slice).unwrap_or(&[]);
        &events[events.len().saturating_sub(limit)..]
    }

    pub fn timer(&self, id: &UserId, purpose: TimerPurpose) -> Option<&Timer> {
        self.timers.get(id).and_then(|t| t.get(&purpose))
    }

    /// Pending timers of one user, in purpose order
    pub fn user_timers(&self, id: &UserId) -> Vec<&Timer> {
        self.timers
            .get(id)
            .map(|t| t.values().collect())
            .unwrap_or_default()
    }

    /// Pending timers whose due instant is at or before `now`, earliest first.
    ///
    /// Local-time dues resolve against each user's current timezone. Timers
    /// of unknown users never come due.
    pub fn due_timers(&self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, &Timer)> {
        let mut due: Vec<_> = self
            .resolved_timers()
            .filter(|(at, _)| *at <= now)
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        due
    }

    /// Earliest pending due instant across all users
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.resolved_timers().map(|(at, _)| at).min()
    }

    fn resolved_timers(&self) -> impl Iterator<Item = (DateTime<Utc>, &Timer)> {
        self.timers.iter().flat_map(move |(user_id, timers)| {
            let user = self.users.get(user_id);
            timers
                .values()
                .filter_map(move |timer| user.map(|u| (timer.due_at(u), timer)))
        })
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
