// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbox notifier
//!
//! Appends one JSON record per message to a file. A messaging bridge tails
//! the file and delivers records to the chat platform.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dl_core::{Message, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the outbox file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub user_id: UserId,
    pub sent_at: DateTime<Utc>,
    pub message: Message,
}

#[derive(Clone)]
pub struct OutboxNotifyAdapter {
    path: PathBuf,
    // Serializes appends so concurrent users never interleave lines
    write: Arc<Mutex<()>>,
}

impl OutboxNotifyAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NotifyAdapter for OutboxNotifyAdapter {
    async fn send(&self, user_id: &UserId, message: &Message) -> Result<(), NotifyError> {
        let record = OutboxRecord {
            user_id: user_id.clone(),
            sent_at: Utc::now(),
            message: message.clone(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
