// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{NaiveDate, NaiveTime, TimeZone};
use dl_core::{CycleId, Due, Tone};

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
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn cycle(id: &str, user_id: &str) -> CycleState {
    CycleState::new(
        CycleId::from(id),
        UserId::from(user_id),
        day(),
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap(),
    )
}

fn checkin(id: &str, user_id: &str, hour: u32) -> Timer {
    Timer::new(
        id,
        UserId::from(user_id),
        TimerPurpose::Checkin1,
        Due::At(Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()),
        day(),
    )
}

#[test]
fn schedule_replaces_same_purpose() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::TimerSchedule {
        timer: checkin("t1", "u1", 9),
    });
    state.apply(&Operation::TimerSchedule {
        timer: checkin("t2", "u1", 10),
    });

    let pending = state.user_timers(&UserId::from("u1"));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.0, "t2");
}

#[test]
fn consume_ignores_replaced_timer() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::TimerSchedule {
        timer: checkin("t2", "u1", 10),
    });
    state.apply(&Operation::TimerConsume {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::Checkin1,
        timer_id: "t1".into(),
    });
    assert!(state
        .timer(&UserId::from("u1"), TimerPurpose::Checkin1)
        .is_some());

    state.apply(&Operation::TimerConsume {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::Checkin1,
        timer_id: "t2".into(),
    });
    assert!(state.timers.is_empty());
}

#[test]
fn cancel_of_missing_timer_is_noop() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::TimerCancel {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::EveningPing,
    });
    assert_eq!(state, MaterializedState::new());
}

#[test]
fn archive_moves_active_to_history_once() {
    let mut state = MaterializedState::new();
    let c = cycle("c1", "u1");
    state.apply(&Operation::CycleCommit { cycle: c.clone() });
    state.apply(&Operation::CycleArchive { cycle: c.clone() });
    state.apply(&Operation::CycleArchive { cycle: c });

    let id = UserId::from("u1");
    assert!(state.active_cycle(&id).is_none());
    assert_eq!(state.history(&id).len(), 1);
}

#[test]
fn archive_of_other_cycle_keeps_active() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::CycleCommit {
        cycle: cycle("c2", "u1"),
    });
    state.apply(&Operation::CycleArchive {
        cycle: cycle("c1", "u1"),
    });

    let id = UserId::from("u1");
    assert_eq!(state.active_cycle(&id).map(|c| c.id.0.as_str()), Some("c2"));
    assert_eq!(state.history(&id).len(), 1);
}

#[test]
fn due_timers_are_ordered_and_skip_unknown_users() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::UserUpsert {
        user: user("u1", chrono_tz::UTC),
    });
    state.apply(&Operation::UserUpsert {
        user: user("u2", chrono_tz::UTC),
    });
    state.apply(&Operation::TimerSchedule {
        timer: checkin("late", "u1", 11),
    });
    state.apply(&Operation::TimerSchedule {
        timer: checkin("early", "u2", 8),
    });
    state.apply(&Operation::TimerSchedule {
        timer: checkin("ghost", "nobody", 7),
    });

    let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
    let ids: Vec<_> = state
        .due_timers(now)
        .into_iter()
        .map(|(_, t)| t.id.0.as_str())
        .collect();
    assert_eq!(ids, vec!["early", "late"]);

    let before = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    assert_eq!(state.due_timers(before).len(), 1);
    assert_eq!(
        state.next_due(),
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap())
    );
}

#[test]
fn local_due_follows_current_timezone() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::UserUpsert {
        user: user("u1", chrono_tz::Europe::Moscow),
    });
    let morning = Timer::morning("m1", &user("u1", chrono_tz::Europe::Moscow), day());
    state.apply(&Operation::TimerSchedule { timer: morning });

    // 09:00 Moscow is 06:00 UTC
    let at_six = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
    assert_eq!(state.due_timers(at_six).len(), 1);

    // Moving to Berlin pushes the same wall-clock ping to 08:00 UTC
    state.apply(&Operation::UserUpsert {
        user: user("u1", chrono_tz::Europe::Berlin),
    });
    assert!(state.due_timers(at_six).is_empty());
    assert_eq!(
        state.next_due(),
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap())
    );
}

#[test]
fn state_survives_json() {
    let mut state = MaterializedState::new();
    state.apply(&Operation::UserUpsert {
        user: user("u1", chrono_tz::UTC),
    });
    state.apply(&Operation::CycleCommit {
        cycle: cycle("c1", "u1"),
    });
    state.apply(&Operation::TimerSchedule {
        timer: checkin("t1", "u1", 9),
    });

    let json = serde_json::to_string(&state).unwrap();
    let back: MaterializedState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}

fn todo(number: u8, text: &str) -> TodoItem {
    TodoItem {
        number,
        text: text.to_string(),
        status: dl_core::TodoStatus::Pending,
        carried_from: Some(CycleId::from("c1")),
        added_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    }
}

#[test]
fn empty_carryover_clears_the_entry() {
    let mut state = MaterializedState::new();
    let user_id = UserId::from("u1");
    state.apply(&Operation::TodosCarried {
        user_id: user_id.clone(),
        todos: vec![todo(1, "call mum")],
    });
    assert_eq!(state.carryover(&user_id).len(), 1);

    state.apply(&Operation::TodosCarried {
        user_id: user_id.clone(),
        todos: Vec::new(),
    });
    assert!(state.carryover(&user_id).is_empty());
    assert!(state.carryover.is_empty());
}

#[test]
fn replayed_event_is_logged_once() {
    let mut state = MaterializedState::new();
    let user_id = UserId::from("u1");
    let event = AnalyticsEvent::new(
        user_id.clone(),
        dl_core::EventKind::DumpCreated,
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 5, 0).unwrap(),
    );
    let op = Operation::EventLogged {
        event: event.clone(),
    };
    state.apply(&op);
    state.apply(&op);

    assert_eq!(state.events(&user_id, 10), &[event]);
}

#[test]
fn event_log_drops_the_oldest_past_the_cap() {
    let mut state = MaterializedState::new();
    let user_id = UserId::from("u1");
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    for i in 0..MAX_EVENTS_PER_USER as i64 + 5 {
        state.apply(&Operation::EventLogged {
            event: AnalyticsEvent::new(
                user_id.clone(),
                dl_core::EventKind::TodoDone,
                start + chrono::Duration::seconds(i),
            ),
        });
    }

    let all = state.events(&user_id, usize::MAX);
    assert_eq!(all.len(), MAX_EVENTS_PER_USER);
    assert_eq!(all[0].at, start + chrono::Duration::seconds(5));

    let recent = state.events(&user_id, 2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1].at, start + chrono::Duration::seconds(MAX_EVENTS_PER_USER as i64 + 4));
}
