// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_the_daily_rhythm() {
    let config = CycleConfig::default();
    assert_eq!(config.checkin_1_after, Duration::from_secs(3 * 3600));
    assert_eq!(config.checkin_2_after, Duration::from_secs(6 * 3600));
    assert_eq!(config.reminder_after(1), Some(Duration::from_secs(30 * 60)));
    assert_eq!(config.reminder_after(2), Some(Duration::from_secs(90 * 60)));
    assert_eq!(config.reminder_after(3), None);
    assert_eq!(config.reminder_after(0), None);
    assert_eq!(config.late_checkins, LateCheckinPolicy::Skip);
}

#[test]
fn empty_json_yields_defaults() {
    let config: CycleConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, CycleConfig::default());
}

#[test]
fn durations_parse_in_humantime_form() {
    let config: CycleConfig = serde_json::from_str(
        r#"{
            "checkin_1_after": "2h 30m",
            "evening_reminders": ["15m"],
            "late_checkins": "deliver"
        }"#,
    )
    .unwrap();
    assert_eq!(config.checkin_1_after, Duration::from_secs(9000));
    assert_eq!(config.evening_reminders, vec![ReminderOffset(Duration::from_secs(900))]);
    assert_eq!(config.late_checkins, LateCheckinPolicy::Deliver);
    assert_eq!(config.checkin_2_after, Duration::from_secs(6 * 3600));
}

#[test]
fn exit_words_ignore_case_and_padding() {
    let config = CycleConfig::default();
    assert!(config.is_exit_word("  Done "));
    assert!(config.is_exit_word("ХВАТИТ"));
    assert!(!config.is_exit_word("done for now"));
}

#[test]
fn summary_mentions_offsets() {
    let summary = CycleConfig::default().summary();
    assert!(summary.contains("+3h"), "{}", summary);
    assert!(summary.contains("30m"), "{}", summary);
}
