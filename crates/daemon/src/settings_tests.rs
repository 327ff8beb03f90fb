// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::{LateCheckinPolicy, UserId};
use tempfile::tempdir;

fn new_user() -> NewUser {
    NewUser {
        id: UserId::from("42"),
        name: "Anna".to_string(),
        timezone: None,
        morning_ping: None,
        evening_ping: None,
        tone: None,
        life_areas: vec!["health".to_string()],
        weekly_focus: Some("  ".to_string()),
        monthly_focus: None,
    }
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.scheduler.poll_interval, Duration::from_secs(15));
    assert_eq!(settings.storage.snapshot_every, 500);
}

#[test]
fn sections_parse_with_humantime_durations() {
    let settings = Settings::parse(
        r#"
        [cycle]
        checkin_1_after = "2h"
        late_checkins = "deliver"

        [inference]
        timeout = "90s"
        command = "/usr/local/bin/coach"
        args = ["--json"]
        model = "small"

        [scheduler]
        poll_interval = "5s"

        [defaults]
        timezone = "Asia/Tokyo"
        tone = "soft"
        "#,
    )
    .unwrap();

    assert_eq!(settings.cycle.checkin_1_after, Duration::from_secs(7200));
    assert_eq!(settings.cycle.late_checkins, LateCheckinPolicy::Deliver);
    assert_eq!(settings.inference.timeout, Duration::from_secs(90));
    assert_eq!(
        settings.inference.command,
        Some(PathBuf::from("/usr/local/bin/coach"))
    );
    assert_eq!(settings.inference.args, vec!["--json".to_string()]);
    assert_eq!(settings.scheduler.poll_interval, Duration::from_secs(5));
    assert_eq!(settings.defaults.timezone, "Asia/Tokyo");
    assert_eq!(settings.defaults.morning_ping, "09:00");
    assert_eq!(settings.defaults.tone, Tone::Soft);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(Settings::parse("[scheduler]\npoll = \"5s\"\n").is_err());
}

#[test]
fn invalid_defaults_fail_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[defaults]\ntimezone = \"Mars/Olympus\"\n").unwrap();
    let err = Settings::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Defaults(_)), "{}", err);
}

#[test]
fn build_user_fills_in_defaults() {
    let now = "2026-03-02T05:00:00Z".parse().unwrap();
    let user = UserDefaults::default().build_user(new_user(), now).unwrap();
    assert_eq!(user.timezone, chrono_tz::Europe::Moscow);
    assert_eq!(user.morning_ping.to_string(), "09:00:00");
    assert_eq!(user.evening_ping.to_string(), "21:00:00");
    assert_eq!(user.tone, Tone::Neutral);
    assert_eq!(user.weekly_focus, None);
    assert_eq!(user.created_at, now);
}

#[test]
fn build_user_rejects_bad_time() {
    let mut new = new_user();
    new.morning_ping = Some("9am".to_string());
    let err = UserDefaults::default()
        .build_user(new, Utc::now())
        .unwrap_err();
    assert!(matches!(err, CalendarError::InvalidTime(_)));
}
