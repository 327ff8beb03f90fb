// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::{Operation, TimerPurpose, UserId};
use tempfile::TempDir;

#[test]
fn missing_snapshot_loads_none() {
    let dir = TempDir::new().unwrap();
    assert!(Snapshot::load(&dir.path().join("snapshot.json"))
        .unwrap()
        .is_none());
}

#[test]
fn save_then_load_keeps_sequence_and_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let mut state = MaterializedState::new();
    state.apply(&Operation::TimerCancel {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::Checkin2,
    });
    Snapshot::new(17, state.clone()).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.sequence, 17);
    assert_eq!(loaded.state, state);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn newer_version_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let mut snapshot = Snapshot::new(1, MaterializedState::new());
    snapshot.version = 99;
    std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let err = Snapshot::load(&path).unwrap_err();
    assert!(matches!(err, SnapshotError::Version { found: 99, .. }));
}

#[test]
fn garbage_is_a_json_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        Snapshot::load(&path).unwrap_err(),
        SnapshotError::Json(_)
    ));
}
