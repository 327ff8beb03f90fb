// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: message delivery and inference

pub mod inference;
pub mod notify;
pub mod traced;

pub use inference::{CommandInference, InferenceAdapter, InferenceError};
pub use notify::{NoOpNotifyAdapter, NotifyAdapter, NotifyError, OutboxNotifyAdapter, OutboxRecord};
pub use traced::{TracedInference, TracedNotifyAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use inference::{FakeInference, InferenceCall};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
