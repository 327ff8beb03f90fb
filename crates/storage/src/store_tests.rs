// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{NaiveDate, NaiveTime, TimeZone};
use dl_core::{CycleId, Due, Stage, Tone};
use std::io::Write;
use tempfile::TempDir;

fn user(id: &str) -> User {
    User {
        id: UserId::from(id),
        name: "Anna".to_string(),
        timezone: chrono_tz::Europe::Moscow,
        morning_ping: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        evening_ping: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        tone: Tone::Soft,
        life_areas: vec!["health".to_string()],
        weekly_focus: None,
        monthly_focus: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn cycle(id: &str) -> CycleState {
    CycleState::new(
        CycleId::from(id),
        UserId::from("u1"),
        day(),
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap(),
    )
}

fn checkin(id: &str) -> Timer {
    Timer::new(
        id,
        UserId::from("u1"),
        TimerPurpose::Checkin1,
        Due::At(Utc.with_ymd_and_hms(2026, 3, 2, 9, 10, 0).unwrap()),
        day(),
    )
}

fn open(dir: &TempDir) -> Store {
    Store::open(dir.path(), StoreConfig { snapshot_every: 0 }).unwrap()
}

#[test]
fn commit_is_visible_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.upsert_user(user("u1")).unwrap();
        let mut c = cycle("c1");
        c.stage = Stage::Analyzing;
        store
            .commit(&[
                Operation::CycleCommit { cycle: c },
                Operation::TimerSchedule {
                    timer: checkin("t1"),
                },
            ])
            .unwrap();
        assert_eq!(store.sequence(), 2);
    }

    let store = open(&dir);
    let id = UserId::from("u1");
    assert_eq!(store.user(&id).map(|u| u.tone), Some(Tone::Soft));
    assert_eq!(store.get_active(&id).map(|c| c.stage), Some(Stage::Analyzing));
    assert!(store.pending_timer(&id, TimerPurpose::Checkin1).is_some());
    assert_eq!(store.sequence(), 2);
}

#[test]
fn empty_commit_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    assert_eq!(store.commit(&[]).unwrap(), 0);
    assert_eq!(store.sequence(), 0);
}

#[test]
fn archive_never_overwrites_history() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let id = UserId::from("u1");

    store.commit_cycle(cycle("c1")).unwrap();
    store.archive(cycle("c1")).unwrap();
    store.commit_cycle(cycle("c2")).unwrap();
    store.archive(cycle("c2")).unwrap();
    store.archive(cycle("c1")).unwrap();

    let ids: Vec<_> = store.history(&id).into_iter().map(|c| c.id.0).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert!(store.get_active(&id).is_none());
}

#[test]
fn timer_registry_contract() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let id = UserId::from("u1");
    store.upsert_user(user("u1")).unwrap();

    store.schedule(checkin("t1")).unwrap();
    store.schedule(checkin("t2")).unwrap();
    assert_eq!(store.timers(&id).len(), 1);

    store
        .consume(id.clone(), TimerPurpose::Checkin1, TimerId::from("t1"))
        .unwrap();
    assert_eq!(
        store
            .pending_timer(&id, TimerPurpose::Checkin1)
            .map(|t| t.id.0),
        Some("t2".to_string())
    );

    let before = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2026, 3, 2, 9, 10, 0).unwrap();
    assert!(store.due_timers(before).is_empty());
    assert_eq!(store.due_timers(after).len(), 1);
    assert_eq!(store.next_due(), Some(after));

    store.cancel(id.clone(), TimerPurpose::Checkin1).unwrap();
    assert!(store.timers(&id).is_empty());
    assert!(store.next_due().is_none());
}

#[test]
fn compaction_keeps_state_and_numbering() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.upsert_user(user("u1")).unwrap();
        store.schedule(checkin("t1")).unwrap();
        assert_eq!(store.compact().unwrap(), 2);
        store.commit_cycle(cycle("c1")).unwrap();
    }
    assert!(dir.path().join("snapshot.json").exists());

    let store = open(&dir);
    let id = UserId::from("u1");
    assert!(store.user(&id).is_some());
    assert!(store.pending_timer(&id, TimerPurpose::Checkin1).is_some());
    assert!(store.get_active(&id).is_some());
    assert_eq!(store.sequence(), 3);
}

#[test]
fn automatic_snapshot_after_threshold() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), StoreConfig { snapshot_every: 2 }).unwrap();
    store.upsert_user(user("u1")).unwrap();
    assert!(!dir.path().join("snapshot.json").exists());
    store.schedule(checkin("t1")).unwrap();
    assert!(dir.path().join("snapshot.json").exists());
    assert_eq!(
        std::fs::metadata(dir.path().join("wal.jsonl")).unwrap().len(),
        0
    );
}

#[test]
fn torn_write_loses_only_the_torn_batch() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.upsert_user(user("u1")).unwrap();
        store.commit_cycle(cycle("c1")).unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("wal.jsonl"))
            .unwrap();
        file.write_all(b"{\"sequence\":3,\"operations\":[").unwrap();
    }

    let store = open(&dir);
    let id = UserId::from("u1");
    assert!(store.get_active(&id).is_some());
    assert_eq!(store.sequence(), 2);

    store.schedule(checkin("t1")).unwrap();
    drop(store);
    let store = open(&dir);
    assert!(store.pending_timer(&id, TimerPurpose::Checkin1).is_some());
}

#[test]
fn entries_already_in_snapshot_are_not_replayed_twice() {
    let dir = TempDir::new().unwrap();
    let wal_copy;
    {
        let store = open(&dir);
        store.commit_cycle(cycle("c1")).unwrap();
        store.archive(cycle("c1")).unwrap();
        wal_copy = std::fs::read(dir.path().join("wal.jsonl")).unwrap();
        store.compact().unwrap();
    }
    // Simulate a crash between snapshot rename and WAL truncation
    std::fs::write(dir.path().join("wal.jsonl"), wal_copy).unwrap();

    let store = open(&dir);
    let id = UserId::from("u1");
    assert_eq!(store.history(&id).len(), 1);
    assert!(store.get_active(&id).is_none());
    assert_eq!(store.sequence(), 2);
}

#[test]
fn failed_commit_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let id = UserId::from("u1");
    store.upsert_user(user("u1")).unwrap();

    store.inject_fault(Some(crate::wal::Fault::TornWrite));
    assert!(matches!(
        store.schedule(checkin("t1")),
        Err(StoreError::Wal(WalError::Io(_)))
    ));
    assert!(store.pending_timer(&id, TimerPurpose::Checkin1).is_none());
    assert_eq!(store.sequence(), 1);

    store.inject_fault(None);
    store.schedule(checkin("t1")).unwrap();
    drop(store);
    let store = open(&dir);
    assert!(store.pending_timer(&id, TimerPurpose::Checkin1).is_some());
    assert_eq!(store.sequence(), 2);
}

#[test]
fn carryover_and_events_survive_compaction() {
    let dir = TempDir::new().unwrap();
    let id = UserId::from("u1");
    {
        let store = open(&dir);
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 21, 30, 0).unwrap();
        store
            .commit(&[
                Operation::TodosCarried {
                    user_id: id.clone(),
                    todos: vec![TodoItem {
                        number: 1,
                        text: "call mum".to_string(),
                        status: dl_core::TodoStatus::Pending,
                        carried_from: Some(CycleId::from("c1")),
                        added_at: at,
                    }],
                },
                Operation::EventLogged {
                    event: AnalyticsEvent::new(id.clone(), dl_core::EventKind::EveningReportDone, at)
                        .with("status", "partial"),
                },
            ])
            .unwrap();
        store.compact().unwrap();
    }

    let store = open(&dir);
    assert_eq!(store.carryover(&id)[0].text, "call mum");
    let events = store.events(&id, 10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data["status"], "partial");
}
