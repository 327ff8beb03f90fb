// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dl-storage: durable state for the dayloop daemon
//!
//! Every state change is an [`Operation`](dl_core::Operation). Operations
//! for one event are appended to the write-ahead log as a single
//! checksummed entry, fsync'd, and only then applied to the in-memory
//! [`MaterializedState`]. Periodic snapshots bound replay time.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod entry;
mod snapshot;
mod state;
mod store;
mod wal;

pub use entry::WalEntry;
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{MaterializedState, MAX_EVENTS_PER_USER};
pub use store::{Store, StoreConfig, StoreError};
pub use wal::{Scan, Wal, WalError};

#[cfg(any(test, feature = "test-support"))]
pub use wal::Fault;
