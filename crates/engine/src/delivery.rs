// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user notification queues
//!
//! Notifications are queued while the event's user lock is held, so queue
//! order is commit order. They are sent after the lock is released. A
//! flush holds the user's send lock and drains the whole queue, so
//! messages of one user go out one at a time and in order, whichever
//! event's flush ends up sending them.

use crate::Executor;
use dl_adapters::{InferenceAdapter, NotifyAdapter};
use dl_core::{Effect, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
struct UserQueue {
    pending: Mutex<VecDeque<Effect>>,
    sending: AsyncMutex<()>,
}

impl UserQueue {
    fn pop(&self) -> Option<Effect> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[derive(Default)]
pub struct Deliveries {
    queues: Mutex<HashMap<UserId, Arc<UserQueue>>>,
}

impl Deliveries {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, user_id: &UserId) -> Arc<UserQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(queues.entry(user_id.clone()).or_default())
    }

    /// Queue notifications behind everything already queued for the user
    pub fn push(&self, user_id: &UserId, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        self.queue(user_id)
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(effects);
    }

    /// Messages queued for the user and not yet taken by a flush
    pub fn pending(&self, user_id: &UserId) -> usize {
        self.queue(user_id)
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Send everything queued for the user.
    ///
    /// Returns once every message queued before the call has been handed
    /// to the adapter, by this flush or by one already running.
    pub async fn flush<N, F>(&self, user_id: &UserId, executor: &Executor<N, F>) -> usize
    where
        N: NotifyAdapter,
        F: InferenceAdapter,
    {
        let queue = self.queue(user_id);
        let _sending = queue.sending.lock().await;

        let mut sent = 0;
        while let Some(effect) = queue.pop() {
            // Delivery failures are logged by the executor; the cycle has already advanced
            let _ = executor.execute(effect).await;
            sent += 1;
        }
        sent
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
