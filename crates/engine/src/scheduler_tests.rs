// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{RuntimeConfig, RuntimeDeps};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use dl_adapters::{FakeInference, FakeNotifyAdapter};
use dl_core::{FakeClock, SequentialIdGen, Stage, Tone, TimerPurpose, User};
use dl_storage::{Store, StoreConfig};
use std::path::Path;
use tempfile::TempDir;

type TestScheduler = Scheduler<FakeNotifyAdapter, FakeInference, FakeClock, SequentialIdGen>;

fn utc(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, min, 0).unwrap()
}

fn user(id: &str, tz: chrono_tz::Tz) -> User {
    User {
        id: UserId::from(id),
        name: id.to_string(),
        timezone: tz,
        morning_ping: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        evening_ping: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        tone: Tone::Neutral,
        life_areas: Vec::new(),
        weekly_focus: None,
        monthly_focus: None,
        created_at: utc(1, 0, 0),
    }
}

fn scheduler(dir: &Path, clock: &FakeClock) -> (TestScheduler, FakeNotifyAdapter) {
    let store = Arc::new(Store::open(dir, StoreConfig::default()).unwrap());
    let notify = FakeNotifyAdapter::new();
    let runtime = Runtime::new(
        RuntimeDeps {
            store,
            notify: notify.clone(),
            inference: FakeInference::new(),
        },
        clock.clone(),
        SequentialIdGen::new("id"),
        RuntimeConfig::default(),
    );
    (
        Scheduler::new(
            Arc::new(runtime),
            SchedulerConfig {
                poll_interval: Duration::from_millis(10),
            },
        ),
        notify,
    )
}

fn stage(scheduler: &TestScheduler, id: &str) -> Stage {
    scheduler
        .runtime
        .store()
        .get_active(&UserId::from(id))
        .map_or(Stage::Idle, |c| c.stage)
}

#[tokio::test]
async fn due_timer_fires_once() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 5, 0));
    let (scheduler, notify) = scheduler(dir.path(), &clock);
    scheduler
        .runtime
        .register_user(user("anna", chrono_tz::Europe::Moscow))
        .await
        .unwrap();

    assert_eq!(scheduler.run_once().await, 0);

    clock.set(utc(2, 6, 0));
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "anna"), Stage::AwaitingDump);
    assert_eq!(scheduler.run_once().await, 0);
    assert_eq!(notify.kinds(), vec!["morning"]);
}

#[tokio::test]
async fn users_in_different_zones_fire_at_their_own_morning() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 0, 0));
    let (scheduler, _) = scheduler(dir.path(), &clock);
    scheduler
        .runtime
        .register_user(user("moscow", chrono_tz::Europe::Moscow))
        .await
        .unwrap();
    scheduler
        .runtime
        .register_user(user("berlin", chrono_tz::Europe::Berlin))
        .await
        .unwrap();

    clock.set(utc(2, 7, 0));
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "moscow"), Stage::AwaitingDump);
    assert_eq!(stage(&scheduler, "berlin"), Stage::Idle);

    clock.set(utc(2, 8, 0));
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "berlin"), Stage::AwaitingDump);
}

#[tokio::test]
async fn busy_user_waits_for_next_tick() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 5, 0));
    let (scheduler, _) = scheduler(dir.path(), &clock);
    scheduler
        .runtime
        .register_user(user("anna", chrono_tz::Europe::Moscow))
        .await
        .unwrap();
    clock.set(utc(2, 6, 0));

    let id = UserId::from("anna");
    let claim = scheduler.in_flight.claim(&id).unwrap();
    assert!(scheduler.is_in_flight(&id));
    assert_eq!(scheduler.run_once().await, 0);

    drop(claim);
    assert!(!scheduler.is_in_flight(&id));
    assert_eq!(scheduler.run_once().await, 1);
}

#[tokio::test]
async fn undelivered_timer_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 5, 0));
    {
        let (scheduler, _) = scheduler(dir.path(), &clock);
        scheduler
            .runtime
            .register_user(user("anna", chrono_tz::Europe::Moscow))
            .await
            .unwrap();
    }

    // The process was down through the morning ping
    clock.set(utc(2, 7, 30));
    let (scheduler, notify) = scheduler(dir.path(), &clock);
    let id = UserId::from("anna");
    assert!(scheduler
        .runtime
        .store()
        .pending_timer(&id, TimerPurpose::MorningPing)
        .is_some());

    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "anna"), Stage::AwaitingDump);
    assert_eq!(notify.kinds(), vec!["morning"]);
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 5, 0));
    let (scheduler, _) = scheduler(dir.path(), &clock);
    scheduler
        .runtime
        .register_user(user("anna", chrono_tz::Europe::Moscow))
        .await
        .unwrap();
    clock.set(utc(2, 6, 0));

    let scheduler = Arc::new(scheduler);
    let (tx, rx) = watch::channel(false);
    let handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    let started = tokio::time::timeout(Duration::from_secs(2), async {
        while stage(&scheduler, "anna") != Stage::AwaitingDump {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "morning ping was never dispatched");

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn timer_is_redelivered_after_storage_failure() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::at(utc(2, 5, 0));
    let (scheduler, notify) = scheduler(dir.path(), &clock);
    scheduler
        .runtime
        .register_user(user("anna", chrono_tz::Europe::Moscow))
        .await
        .unwrap();
    clock.set(utc(2, 6, 0));

    let store = scheduler.runtime.store();
    store.inject_fault(Some(dl_storage::Fault::SyncFailed));
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "anna"), Stage::Idle);
    assert!(notify.calls().is_empty());

    // Still due on the next tick, and delivered once writes succeed
    store.inject_fault(None);
    assert_eq!(scheduler.run_once().await, 1);
    assert_eq!(stage(&scheduler, "anna"), Stage::AwaitingDump);
    assert_eq!(notify.kinds(), vec!["morning"]);
    assert_eq!(scheduler.run_once().await, 0);
}
