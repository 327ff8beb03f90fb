// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dl-daemon library: the wire protocol and settings shared with the CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod protocol;
pub mod settings;

pub use protocol::{
    InputResult, NewUser, ProtocolError, Query, Request, Response, TimerSummary, UserPatch,
    UserSummary, PROTOCOL_VERSION,
};
pub use settings::{ConfigError, Settings};
