// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::{TimerPurpose, UserId};
use std::io::Write;
use tempfile::TempDir;

fn temp_wal_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wal.jsonl");
    (dir, path)
}

fn op() -> Operation {
    Operation::TimerCancel {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::Checkin1,
    }
}

#[test]
fn append_assigns_increasing_sequences() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.sequence(), 0);

    assert_eq!(wal.append(&[op()]).unwrap(), 1);
    assert_eq!(wal.append(&[op(), op()]).unwrap(), 2);
    assert_eq!(wal.sequence(), 2);

    let scan = Wal::scan(&path).unwrap();
    assert_eq!(scan.entries.len(), 2);
    assert_eq!(scan.entries[1].operations.len(), 2);
    assert!(!scan.corrupt);
}

#[test]
fn reopen_continues_numbering() {
    let (_dir, path) = temp_wal_path();
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[op()]).unwrap();
        wal.append(&[op()]).unwrap();
    }
    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.append(&[op()]).unwrap(), 3);
}

#[test]
fn floor_from_snapshot_wins_over_empty_log() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 41).unwrap();
    assert_eq!(wal.append(&[op()]).unwrap(), 42);
}

#[test]
fn replay_skips_covered_entries() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    for _ in 0..4 {
        wal.append(&[op()]).unwrap();
    }
    let sequences: Vec<_> = Wal::replay(&path, 2)
        .unwrap()
        .entries
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, vec![3, 4]);
}

#[test]
fn missing_file_scans_empty() {
    let (_dir, path) = temp_wal_path();
    let scan = Wal::scan(&path).unwrap();
    assert!(scan.entries.is_empty());
    assert!(!scan.corrupt);
}

#[test]
fn torn_tail_is_detected_and_cut_on_open() {
    let (_dir, path) = temp_wal_path();
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[op()]).unwrap();
        wal.append(&[op()]).unwrap();
    }
    let good_len = std::fs::metadata(&path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"sequence\":3,\"timest").unwrap();
    }

    let scan = Wal::scan(&path).unwrap();
    assert!(scan.corrupt);
    assert_eq!(scan.entries.len(), 2);
    assert_eq!(scan.valid_len, good_len);

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);
    assert_eq!(wal.append(&[op()]).unwrap(), 3);
    assert_eq!(Wal::scan(&path).unwrap().entries.len(), 3);
}

#[test]
fn checksum_mismatch_stops_scan() {
    let (_dir, path) = temp_wal_path();
    let mut entry = WalEntry::new(1, vec![op()]);
    entry.checksum ^= 1;
    let good = WalEntry::new(2, vec![op()]);
    std::fs::write(
        &path,
        format!("{}\n{}\n", entry.to_line().unwrap(), good.to_line().unwrap()),
    )
    .unwrap();

    let scan = Wal::scan(&path).unwrap();
    assert!(scan.corrupt);
    assert!(scan.entries.is_empty());
}

#[test]
fn truncate_keeps_numbering() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[op()]).unwrap();
    wal.truncate().unwrap();
    assert!(Wal::scan(&path).unwrap().entries.is_empty());
    assert_eq!(wal.append(&[op()]).unwrap(), 2);
}

#[test]
fn fragment_left_by_earlier_failure_is_cut_before_next_append() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[op()]).unwrap();

    // A write that died halfway through
    let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
    raw.write_all(br#"{"sequence":2,"timest"#).unwrap();
    drop(raw);

    assert_eq!(wal.append(&[op()]).unwrap(), 2);
    assert_eq!(wal.append(&[op()]).unwrap(), 3);

    let scan = Wal::scan(&path).unwrap();
    let sequences: Vec<u64> = scan.entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(!scan.corrupt);
}

#[test]
fn torn_append_is_rolled_back() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[op()]).unwrap();

    wal.inject_fault(Some(Fault::TornWrite));
    assert!(matches!(wal.append(&[op()]), Err(WalError::Io(_))));
    assert_eq!(wal.sequence(), 1);

    wal.inject_fault(None);
    assert_eq!(wal.append(&[op()]).unwrap(), 2);
    assert_eq!(wal.append(&[op()]).unwrap(), 3);
    drop(wal);

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.sequence(), 3);
    let scan = Wal::scan(&path).unwrap();
    assert_eq!(scan.entries.len(), 3);
    assert!(!scan.corrupt);
}

#[test]
fn failed_fsync_leaves_no_entry_behind() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[op()]).unwrap();

    wal.inject_fault(Some(Fault::SyncFailed));
    assert!(wal.append(&[op(), op()]).is_err());
    assert_eq!(Wal::scan(&path).unwrap().entries.len(), 1);

    // The sequence is reused by the next batch, never twice in the file
    wal.inject_fault(None);
    assert_eq!(wal.append(&[op()]).unwrap(), 2);
    let scan = Wal::scan(&path).unwrap();
    let sequences: Vec<u64> = scan.entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(scan.entries[1].operations.len(), 1);
}

#[test]
fn failed_rollback_poisons_until_reopen() {
    let (_dir, path) = temp_wal_path();
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[op()]).unwrap();

    wal.inject_fault(Some(Fault::Unrecoverable));
    assert!(matches!(wal.append(&[op()]), Err(WalError::Io(_))));
    assert!(wal.is_poisoned());

    wal.inject_fault(None);
    assert!(matches!(wal.append(&[op()]), Err(WalError::Poisoned)));
    assert!(matches!(wal.truncate(), Err(WalError::Poisoned)));
    drop(wal);

    // Reopening cuts the fragment and resumes after the last good entry
    let mut wal = Wal::open(&path, 0).unwrap();
    assert!(!wal.is_poisoned());
    assert_eq!(wal.append(&[op()]).unwrap(), 2);
    let scan = Wal::scan(&path).unwrap();
    assert_eq!(scan.entries.len(), 2);
    assert!(!scan.corrupt);
}
