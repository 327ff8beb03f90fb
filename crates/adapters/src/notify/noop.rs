// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op notifier for when no delivery channel is configured.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use dl_core::{Message, UserId};

/// Notify adapter that drops every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifyAdapter;

impl NoOpNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for NoOpNotifyAdapter {
    async fn send(&self, _user_id: &UserId, _message: &Message) -> Result<(), NotifyError> {
        Ok(())
    }
}
