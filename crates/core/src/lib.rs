// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dl-core: pure domain library for the dayloop coaching daemon
//!
//! This crate provides:
//! - The per-user daily cycle state machine (`machine`)
//! - Users, local-time calendar math, and durable timer descriptions
//! - Effects, operations, analytics events and configuration shared by
//!   the other crates
//!
//! Nothing in here performs I/O. Time and ids come in through the
//! [`Clock`] and [`IdGen`] abstractions.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod analytics;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod effect;
pub mod error;
pub mod event;
pub mod id;
pub mod machine;
pub mod operation;
pub mod prompt;
pub mod timer;
pub mod traced;
pub mod user;

pub use analytics::{AnalyticsEvent, EventKind};
pub use calendar::{parse_local_time, parse_timezone, resolve_local};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{CycleConfig, LateCheckinPolicy, ReminderOffset};
pub use cycle::{
    Analysis, CheckinResponse, CheckinSlot, CheckinStatus, Closure, CycleClosure, CycleId,
    CycleState, DayStatus, DeeperOutcome, DeeperRecord, DeeperSession, DeeperTrigger, Dump,
    EveningReport, FocusChoice, FocusOption, Speaker, Stage, TodoItem, TodoStatus, Turn,
    MAX_TODOS,
};
pub use effect::{AnalysisRequest, DeeperRequest, Effect};
pub use error::{CalendarError, InferenceFailure, InputError};
pub use event::{Choice, CycleEvent, DeeperReply, InputKind, UserInput};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use machine::{Context, Step};
pub use operation::Operation;
pub use prompt::{Message, Prompt, ReplyOption};
pub use timer::{Due, Timer, TimerId, TimerPurpose};
pub use traced::TracedEffect;
pub use user::{Tone, User, UserId};
