// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message delivery adapters

mod noop;
mod outbox;

pub use noop::NoOpNotifyAdapter;
pub use outbox::{OutboxNotifyAdapter, OutboxRecord};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

use async_trait::async_trait;
use dl_core::{Message, UserId};
use thiserror::Error;

/// Errors from message delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivers rendered prompts to a user
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    async fn send(&self, user_id: &UserId, message: &Message) -> Result<(), NotifyError>;
}
