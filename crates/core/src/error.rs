// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain error types

use crate::cycle::Stage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user input that cannot be applied to the current cycle.
///
/// Rejected inputs leave the cycle untouched; the user is told why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("empty message")]
    Empty,
    #[error("message too short: need at least {min} characters")]
    TooShort { min: usize },
    #[error("unknown choice: {0}")]
    InvalidChoice(String),
    #[error("energy must be between 1 and 5, got {0}")]
    EnergyOutOfRange(u8),
    #[error("input not expected while {stage}")]
    Unexpected { stage: Stage },
    #[error("nothing is waiting for an answer right now")]
    NothingPending,
    #[error("no active cycle")]
    NoActiveCycle,
    #[error("analysis still in progress")]
    AnalysisInProgress,
    #[error("a deeper session cannot start while {stage}")]
    DeeperUnavailable { stage: Stage },
    #[error("already in a deeper session")]
    AlreadyInDeeper,
    #[error("today's focus is already confirmed")]
    FocusAlreadySet,
    #[error("no checklist item {0}")]
    UnknownTodo(u8),
    #[error("checklist item {0} is already closed")]
    TodoClosed(u8),
    #[error("the checklist is full ({max} items)")]
    TodoListFull { max: usize },
}

/// Failure of an inference call, fed back into the state machine as an event
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum InferenceFailure {
    #[error("inference timed out")]
    Timeout,
    #[error("inference failed: {0}")]
    Provider(String),
}

/// Errors from user settings: time zones and ping times
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("unknown time zone: {0}")]
    UnknownTimezone(String),
    #[error("invalid time of day (expected HH:MM): {0}")]
    InvalidTime(String),
}
