// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store: timer registry and cycle state store over one WAL
//!
//! `commit` appends a batch of operations as one entry, fsyncs, and only
//! then applies it to the in-memory state. A failed append leaves the
//! state untouched.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use dl_core::{
    AnalyticsEvent, CycleState, Operation, Timer, TimerId, TimerPurpose, TodoItem, User, UserId,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// WAL entries between automatic snapshots (0 disables them)
    pub snapshot_every: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_every: 500,
        }
    }
}

struct Inner {
    wal: Wal,
    state: MaterializedState,
    since_snapshot: u64,
}

pub struct Store {
    config: StoreConfig,
    snapshot_path: PathBuf,
    inner: Mutex<Inner>,
}

impl Store {
    /// Open or create a store in `dir`.
    ///
    /// Loads `snapshot.json` if present, then replays `wal.jsonl` entries
    /// after the snapshot's sequence. Replay stops at the first corrupt
    /// entry.
    pub fn open(dir: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let wal_path = dir.join("wal.jsonl");
        let snapshot_path = dir.join("snapshot.json");

        let (mut state, floor) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.sequence),
            None => (MaterializedState::new(), 0),
        };

        let replay = Wal::replay(&wal_path, floor)?;
        if replay.corrupt {
            tracing::warn!(
                replayed = replay.entries.len(),
                "stopping WAL replay at corrupt entry"
            );
        }
        for entry in &replay.entries {
            for op in &entry.operations {
                state.apply(op);
            }
        }
        let replayed = replay.entries.len() as u64;

        let wal = Wal::open(&wal_path, floor)?;
        tracing::info!(
            sequence = wal.sequence(),
            snapshot = floor,
            replayed,
            users = state.users.len(),
            "store opened"
        );

        Ok(Self {
            config,
            snapshot_path,
            inner: Mutex::new(Inner {
                wal,
                state,
                since_snapshot: replayed,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Durably record a batch of operations, then apply it.
    ///
    /// Returns the WAL sequence of the batch. An empty batch writes nothing
    /// and returns the current sequence.
    ///
    /// Blocking: the fsync runs on the calling thread while the store mutex
    /// is held, so commits from all users are serialized. Async callers pay
    /// one fsync of worker-thread time per event; batches are small and the
    /// daemon handles a few events per user per day.
    pub fn commit(&self, operations: &[Operation]) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        if operations.is_empty() {
            return Ok(inner.wal.sequence());
        }

        let sequence = inner.wal.append(operations)?;
        for op in operations {
            inner.state.apply(op);
        }
        inner.since_snapshot += 1;
        tracing::debug!(sequence, ops = operations.len(), "committed");

        if self.config.snapshot_every > 0 && inner.since_snapshot >= self.config.snapshot_every {
            // The batch is durable in the WAL; a failed snapshot only delays compaction
            if let Err(e) = self.compact_locked(&mut inner) {
                tracing::warn!(error = %e, "automatic snapshot failed");
            }
        }
        Ok(sequence)
    }

    /// Make every following WAL append fail until cleared with `None`
    #[cfg(any(test, feature = "test-support"))]
    pub fn inject_fault(&self, fault: Option<crate::wal::Fault>) {
        self.lock().wal.inject_fault(fault);
    }

    /// Snapshot the state and truncate the WAL
    pub fn compact(&self) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        self.compact_locked(&mut inner)
    }

    fn compact_locked(&self, inner: &mut Inner) -> Result<u64, StoreError> {
        let sequence = inner.wal.sequence();
        Snapshot::new(sequence, inner.state.clone()).save(&self.snapshot_path)?;
        inner.wal.truncate()?;
        inner.since_snapshot = 0;
        tracing::info!(sequence, "snapshot written, WAL truncated");
        Ok(sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.lock().wal.sequence()
    }

    /// A copy of the whole materialized state
    pub fn state(&self) -> MaterializedState {
        self.lock().state.clone()
    }

    pub fn user(&self, id: &UserId) -> Option<User> {
        self.lock().state.user(id).cloned()
    }

    pub fn users(&self) -> Vec<User> {
        self.lock().state.users.values().cloned().collect()
    }

    pub fn get_active(&self, id: &UserId) -> Option<CycleState> {
        self.lock().state.active_cycle(id).cloned()
    }

    pub fn active_cycles(&self) -> Vec<CycleState> {
        self.lock().state.active.values().cloned().collect()
    }

    pub fn history(&self, id: &UserId) -> Vec<CycleState> {
        self.lock().state.history(id).to_vec()
    }

    pub fn carryover(&self, id: &UserId) -> Vec<TodoItem> {
        self.lock().state.carryover(id).to_vec()
    }

    pub fn events(&self, id: &UserId, limit: usize) -> Vec<AnalyticsEvent> {
        self.lock().state.events(id, limit).to_vec()
    }

    pub fn pending_timer(&self, id: &UserId, purpose: TimerPurpose) -> Option<Timer> {
        self.lock().state.timer(id, purpose).cloned()
    }

    pub fn timers(&self, id: &UserId) -> Vec<Timer> {
        self.lock()
            .state
            .user_timers(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Pending timers due at or before `now`, earliest first
    pub fn due_timers(&self, now: DateTime<Utc>) -> Vec<Timer> {
        self.lock()
            .state
            .due_timers(now)
            .into_iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.lock().state.next_due()
    }

    pub fn upsert_user(&self, user: User) -> Result<u64, StoreError> {
        self.commit(&[Operation::UserUpsert { user }])
    }

    pub fn schedule(&self, timer: Timer) -> Result<u64, StoreError> {
        self.commit(&[Operation::TimerSchedule { timer }])
    }

    pub fn cancel(&self, user_id: UserId, purpose: TimerPurpose) -> Result<u64, StoreError> {
        self.commit(&[Operation::TimerCancel { user_id, purpose }])
    }

    pub fn consume(
        &self,
        user_id: UserId,
        purpose: TimerPurpose,
        timer_id: TimerId,
    ) -> Result<u64, StoreError> {
        self.commit(&[Operation::TimerConsume {
            user_id,
            purpose,
            timer_id,
        }])
    }

    pub fn commit_cycle(&self, cycle: CycleState) -> Result<u64, StoreError> {
        self.commit(&[Operation::CycleCommit { cycle }])
    }

    pub fn archive(&self, cycle: CycleState) -> Result<u64, StoreError> {
        self.commit(&[Operation::CycleArchive { cycle }])
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
