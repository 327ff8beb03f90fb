// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::user::Tone;
use chrono::{NaiveTime, TimeZone};

fn user_in(tz: Tz) -> User {
    User {
        id: UserId::from("u1"),
        name: "Anna".to_string(),
        timezone: tz,
        morning_ping: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        evening_ping: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        tone: Tone::Soft,
        life_areas: vec![],
        weekly_focus: None,
        monthly_focus: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    }
}

#[test]
fn morning_timer_is_local_and_follows_zone_changes() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let mut user = user_in(chrono_tz::Europe::Moscow);
    let timer = Timer::morning("t-1", &user, date);

    assert_eq!(timer.purpose, TimerPurpose::MorningPing);
    assert_eq!(timer.attempt, 1);
    assert_eq!(
        timer.due_at(&user),
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    );

    user.timezone = chrono_tz::UTC;
    assert_eq!(
        timer.due_at(&user),
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    );
}

#[test]
fn absolute_timer_ignores_zone() {
    let user = user_in(chrono_tz::America::New_York);
    let at = Utc.with_ymd_and_hms(2026, 3, 2, 12, 10, 0).unwrap();
    let timer = Timer::new(
        "t-2",
        user.id.clone(),
        TimerPurpose::Checkin1,
        Due::At(at),
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
    );
    assert_eq!(timer.due_at(&user), at);
    assert!(timer.is_due(&user, at));
    assert!(!timer.is_due(&user, at - chrono::TimeDelta::seconds(1)));
}

#[test]
fn purposes_serialize_with_stable_names() {
    assert_eq!(
        serde_json::to_string(&TimerPurpose::Checkin1).unwrap(),
        "\"checkin_1\""
    );
    assert_eq!(
        serde_json::to_string(&TimerPurpose::MorningPing).unwrap(),
        "\"morning_ping\""
    );
    for purpose in TimerPurpose::ALL {
        let json = serde_json::to_string(&purpose).unwrap();
        assert_eq!(json.trim_matches('"'), purpose.as_str());
    }
}
