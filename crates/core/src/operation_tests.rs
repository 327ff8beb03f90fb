// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::timer::Due;
use chrono::{NaiveDate, TimeZone, Utc};

#[test]
fn operations_are_tagged_by_type() {
    let op = Operation::TimerCancel {
        user_id: UserId::from("u1"),
        purpose: TimerPurpose::Checkin2,
    };
    let json = serde_json::to_value(&op).unwrap();
    assert_eq!(json["type"], "timer_cancel");
    assert_eq!(json["purpose"], "checkin_2");
    assert_eq!(op.name(), "timer_cancel");
}

#[test]
fn timer_schedule_survives_serialization() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let timer = Timer::new(
        "t1",
        UserId::from("u1"),
        TimerPurpose::Checkin1,
        Due::At(Utc.with_ymd_and_hms(2026, 3, 2, 12, 10, 0).unwrap()),
        date,
    );
    let op = Operation::TimerSchedule { timer };

    let json = serde_json::to_string(&op).unwrap();
    let parsed: Operation = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, op);
    assert_eq!(parsed.user_id(), &UserId::from("u1"));
}

#[test]
fn unknown_operation_type_is_rejected() {
    let result = serde_json::from_str::<Operation>(r#"{"type":"user_delete","id":"42"}"#);
    assert!(result.is_err());
}

#[test]
fn event_logged_belongs_to_the_event_user() {
    let event = crate::analytics::AnalyticsEvent::new(
        UserId::from("u7"),
        crate::analytics::EventKind::CheckinDone,
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 15, 0).unwrap(),
    )
    .with("slot", 1);
    let op = Operation::EventLogged { event };

    let json = serde_json::to_value(&op).unwrap();
    assert_eq!(json["type"], "event_logged");
    assert_eq!(json["event"]["kind"], "checkin_done");
    assert_eq!(op.user_id(), &UserId::from("u7"));
}
