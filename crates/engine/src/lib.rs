// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dayloop execution engine
//!
//! The [`Runtime`] feeds events through the cycle state machine under a
//! per-user lock, commits the resulting operations, and sends the
//! notifications once the lock is released. The [`Scheduler`] polls the
//! durable timer registry and hands due timers to the runtime.

mod delivery;
mod error;
mod executor;
mod locks;
mod runtime;
mod scheduler;

pub use error::RuntimeError;
pub use executor::{ExecuteError, Executor};
pub use locks::UserLocks;
pub use runtime::{Handled, Runtime, RuntimeConfig, RuntimeDeps};
pub use scheduler::{Scheduler, SchedulerConfig};
