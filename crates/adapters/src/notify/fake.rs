// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notification adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use dl_core::{Message, UserId};
use std::sync::{Arc, Mutex};

/// Recorded notification
#[derive(Debug, Clone)]
pub struct NotifyCall {
    pub user_id: UserId,
    pub message: Message,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<NotifyCall>,
    fail: bool,
}

/// Fake notification adapter for testing
#[derive(Clone, Default)]
pub struct FakeNotifyAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeNotifyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded notifications
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    /// Prompt kinds sent so far, in order
    pub fn kinds(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.message.kind).collect()
    }

    /// Make subsequent sends fail (the call is still recorded)
    pub fn set_failing(&self, fail: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail = fail;
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clear();
    }
}

#[async_trait]
impl NotifyAdapter for FakeNotifyAdapter {
    async fn send(&self, user_id: &UserId, message: &Message) -> Result<(), NotifyError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(NotifyCall {
            user_id: user_id.clone(),
            message: message.clone(),
        });
        if inner.fail {
            return Err(NotifyError::SendFailed("fake failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
