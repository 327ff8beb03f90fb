// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use dl_core::UserId;
use dl_storage::StoreError;
use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    #[error("user already registered: {0}")]
    UserExists(UserId),
}
