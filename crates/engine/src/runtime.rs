// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the dayloop engine
//!
//! Each event is handled under its user's lock: read user and cycle, run
//! the state machine, commit the operations as one WAL entry, queue the
//! notifications. The lock is released before anything is sent; the
//! user's queue keeps messages in commit order. Inference effects are
//! handed back to the caller and their results re-enter as new events.

use crate::{delivery::Deliveries, error::RuntimeError, Executor, UserLocks};
use dl_adapters::{InferenceAdapter, NotifyAdapter};
use dl_core::{
    machine, AnalyticsEvent, Clock, Context, CycleConfig, CycleEvent, Due, Effect, IdGen, InputError, Operation,
    EventKind, Stage, Timer, TimerId, TimerPurpose, User, UserId, UserInput,
};
use dl_storage::Store;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Runtime behavior configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub cycle: CycleConfig,
    /// Upper bound on a single inference call
    pub inference_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle: CycleConfig::default(),
            inference_timeout: Duration::from_secs(60),
        }
    }
}

/// Runtime adapter dependencies
pub struct RuntimeDeps<N, F> {
    pub store: Arc<Store>,
    pub notify: N,
    pub inference: F,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub outcome: &'static str,
    pub rejected: Option<InputError>,
    /// The user's stage after the event
    pub stage: Stage,
    /// Inference effects to run outside the user lock
    pub deferred: Vec<Effect>,
}

/// Runtime that coordinates the system
pub struct Runtime<N, F, C: Clock, I: IdGen> {
    executor: Executor<N, F>,
    store: Arc<Store>,
    locks: UserLocks,
    deliveries: Deliveries,
    config: CycleConfig,
    clock: C,
    id_gen: I,
}

impl<N, F, C, I> Runtime<N, F, C, I>
where
    N: NotifyAdapter,
    F: InferenceAdapter,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: RuntimeDeps<N, F>, clock: C, id_gen: I, config: RuntimeConfig) -> Self {
        Self {
            executor: Executor::new(deps.notify, deps.inference, config.inference_timeout),
            store: deps.store,
            locks: UserLocks::new(),
            deliveries: Deliveries::new(),
            config: config.cycle,
            clock,
            id_gen,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Handle one event under the user's lock, then send its notifications.
    ///
    /// A storage failure aborts the event before anything is applied or
    /// sent; a timer event then stays pending and is delivered again.
    pub async fn handle_event(&self, event: CycleEvent) -> Result<Handled, RuntimeError> {
        let user_id = event.user_id().clone();
        let span = tracing::info_span!("event", event = event.name(), user_id = %user_id);

        let handled = self.apply_event(&user_id, event).instrument(span.clone()).await?;
        self.deliveries
            .flush(&user_id, &self.executor)
            .instrument(span)
            .await;
        Ok(handled)
    }

    /// Read, compute, commit and queue, all under the user's lock
    async fn apply_event(
        &self,
        user_id: &UserId,
        event: CycleEvent,
    ) -> Result<Handled, RuntimeError> {
        let _lock = self.locks.lock(user_id).await;

        let user = self
            .store
            .user(user_id)
            .ok_or_else(|| RuntimeError::UnknownUser(user_id.clone()))?;
        let active = self.store.get_active(user_id);
        let carryover = self.store.carryover(user_id);
        let ctx = Context {
            user: &user,
            now: self.clock.now(),
            config: &self.config,
            ids: &self.id_gen,
            carryover: &carryover,
        };

        let step = machine::handle(&ctx, active.as_ref(), &event);
        if step.is_noop() {
            tracing::debug!(outcome = step.outcome, "no-op");
        }

        let stage_before = active.as_ref().map_or(Stage::Idle, |c| c.stage);
        self.store.commit(&step.operations)?;
        let stage = self
            .store
            .get_active(user_id)
            .map_or(Stage::Idle, |c| c.stage);
        tracing::info!(
            outcome = step.outcome,
            from = %stage_before,
            to = %stage,
            ops = step.operations.len(),
            effects = step.effects.len(),
            "handled"
        );

        let (deferred, notifications): (Vec<_>, Vec<_>) =
            step.effects.into_iter().partition(Effect::is_inference);
        self.deliveries.push(user_id, notifications);

        Ok(Handled {
            outcome: step.outcome,
            rejected: step.rejected,
            stage,
            deferred,
        })
    }

    /// Run inference effects and feed their results back, until none remain
    pub async fn run_deferred(&self, effects: Vec<Effect>) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            let event = match self.executor.execute(effect).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => continue,
            };
            match self.handle_event(event).await {
                Ok(handled) => pending.extend(handled.deferred),
                Err(e) => tracing::error!(error = %e, "failed to apply inference result"),
            }
        }
    }

    /// Handle an event and everything it triggers
    pub async fn process(&self, event: CycleEvent) -> Result<Handled, RuntimeError> {
        let handled = self.handle_event(event).await?;
        self.run_deferred(handled.deferred.clone()).await;
        Ok(handled)
    }

    pub async fn input(&self, input: UserInput) -> Result<Handled, RuntimeError> {
        self.handle_event(CycleEvent::Input { input }).await
    }

    /// Register a new user and schedule their first morning ping
    pub async fn register_user(&self, user: User) -> Result<Timer, RuntimeError> {
        let _lock = self.locks.lock(&user.id).await;
        if self.store.user(&user.id).is_some() {
            return Err(RuntimeError::UserExists(user.id));
        }

        let now = self.clock.now();
        let date = user.next_morning_date(now);
        let timer = Timer::morning(self.id_gen.next_as::<TimerId>(), &user, date);
        self.store.commit(&[
            Operation::UserUpsert { user: user.clone() },
            Operation::TimerSchedule {
                timer: timer.clone(),
            },
            Operation::EventLogged {
                event: AnalyticsEvent::new(user.id.clone(), EventKind::UserRegistered, now)
                    .with("timezone", user.timezone),
            },
        ])?;
        tracing::info!(user_id = %user.id, timezone = %user.timezone, first_morning = %date, "user registered");
        Ok(timer)
    }

    /// Replace a user's settings.
    ///
    /// Pending ping timers keep their date and move to the new local
    /// times; a new timezone applies through local-time resolution.
    pub async fn update_user(&self, user: User) -> Result<(), RuntimeError> {
        let _lock = self.locks.lock(&user.id).await;
        let previous = self
            .store
            .user(&user.id)
            .ok_or_else(|| RuntimeError::UnknownUser(user.id.clone()))?;

        let mut user = user;
        user.created_at = previous.created_at;
        let mut operations = vec![Operation::UserUpsert { user: user.clone() }];

        if previous.morning_ping != user.morning_ping {
            if let Some(timer) = self.store.pending_timer(&user.id, TimerPurpose::MorningPing) {
                operations.push(Operation::TimerSchedule {
                    timer: Timer::morning(timer.id, &user, timer.cycle_date),
                });
            }
        }
        if previous.evening_ping != user.evening_ping {
            if let Some(mut timer) = self.store.pending_timer(&user.id, TimerPurpose::EveningPing) {
                // Reminders are relative to the ping that already went out
                if timer.attempt == 1 {
                    timer.due = Due::Local(user.evening_ping_on(timer.cycle_date));
                    operations.push(Operation::TimerSchedule { timer });
                }
            }
        }

        self.store.commit(&operations)?;
        tracing::info!(user_id = %user.id, ops = operations.len(), "user updated");
        Ok(())
    }

    /// The user's most recent analytics events, oldest first
    pub fn events(&self, user_id: &UserId, limit: usize) -> Result<Vec<AnalyticsEvent>, RuntimeError> {
        if self.store.user(user_id).is_none() {
            return Err(RuntimeError::UnknownUser(user_id.clone()));
        }
        Ok(self.store.events(user_id, limit))
    }

    /// Reconcile every user after a restart.
    ///
    /// Returns the number of users whose state changed.
    pub async fn recover(&self) -> Result<usize, RuntimeError> {
        let mut changed = 0;
        for user in self.store.users() {
            let morning_pending = self
                .store
                .pending_timer(&user.id, TimerPurpose::MorningPing)
                .is_some();
            let sequence = self.store.sequence();
            let handled = self
                .handle_event(CycleEvent::Recover {
                    user_id: user.id.clone(),
                    morning_pending,
                })
                .await?;
            if self.store.sequence() != sequence {
                changed += 1;
                tracing::info!(user_id = %user.id, outcome = handled.outcome, "recovered");
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
