// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler runtime: polls the durable timer registry
//!
//! Every tick collects due timers, groups them by user and spawns one task
//! per user that handles that user's timers in due order. A user whose
//! previous batch is still running is skipped until the next tick. Timers
//! leave the registry only when the event that consumes them commits, so
//! a crash in between delivers them again.

use crate::Runtime;
use dl_adapters::{InferenceAdapter, NotifyAdapter};
use dl_core::{Clock, CycleEvent, IdGen, Timer, UserId};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Users with a dispatch task still running
#[derive(Default)]
struct InFlight {
    users: Mutex<HashSet<UserId>>,
}

impl InFlight {
    fn claim(self: &Arc<Self>, user_id: &UserId) -> Option<Claim> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.insert(user_id.clone()).then(|| Claim {
            owner: Arc::clone(self),
            user_id: user_id.clone(),
        })
    }

    fn contains(&self, user_id: &UserId) -> bool {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_id)
    }
}

/// Releases the user when the dispatch task ends, however it ends
struct Claim {
    owner: Arc<InFlight>,
    user_id: UserId,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.owner
            .users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.user_id);
    }
}

pub struct Scheduler<N, F, C: Clock, I: IdGen> {
    runtime: Arc<Runtime<N, F, C, I>>,
    in_flight: Arc<InFlight>,
    config: SchedulerConfig,
}

impl<N, F, C, I> Scheduler<N, F, C, I>
where
    N: NotifyAdapter,
    F: InferenceAdapter,
    C: Clock,
    I: IdGen,
{
    pub fn new(runtime: Arc<Runtime<N, F, C, I>>, config: SchedulerConfig) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(InFlight::default()),
            config,
        }
    }

    pub fn is_in_flight(&self, user_id: &UserId) -> bool {
        self.in_flight.contains(user_id)
    }

    /// Spawn dispatch tasks for every due timer; returns how many timers
    /// were handed out
    pub fn tick(&self, tasks: &mut JoinSet<()>) -> usize {
        let now = self.runtime.clock().now();
        let due = self.runtime.store().due_timers(now);
        if due.is_empty() {
            return 0;
        }

        // Due order is preserved within each user
        let mut by_user: BTreeMap<UserId, Vec<Timer>> = BTreeMap::new();
        for timer in due {
            by_user.entry(timer.user_id.clone()).or_default().push(timer);
        }

        let mut dispatched = 0;
        for (user_id, timers) in by_user {
            let Some(claim) = self.in_flight.claim(&user_id) else {
                tracing::debug!(%user_id, "user busy, timers wait for next tick");
                continue;
            };
            dispatched += timers.len();
            let runtime = Arc::clone(&self.runtime);
            tasks.spawn(async move {
                let _claim = claim;
                for timer in timers {
                    let purpose = timer.purpose;
                    if let Err(e) = runtime.process(CycleEvent::TimerFired { timer }).await {
                        tracing::error!(%user_id, %purpose, error = %e, "timer dispatch failed");
                        break;
                    }
                }
            });
        }
        dispatched
    }

    /// One tick, waiting for every spawned task
    pub async fn run_once(&self) -> usize {
        let mut tasks = JoinSet::new();
        let dispatched = self.tick(&mut tasks);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "dispatch task panicked");
            }
        }
        dispatched
    }

    /// Poll until `shutdown` flips to true, then wait for running tasks
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let dispatched = self.tick(&mut tasks);
                    if dispatched > 0 {
                        tracing::debug!(dispatched, "dispatched due timers");
                    }
                    while let Some(result) = tasks.try_join_next() {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "dispatch task panicked");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
