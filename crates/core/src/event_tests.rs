// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    focus_a = { "focus:A", Choice::Focus(FocusChoice::A) },
    focus_b_lower = { "focus:b", Choice::Focus(FocusChoice::B) },
    energy = { "energy:4", Choice::Energy(4) },
    energy_out_of_range_still_parses = { "energy:9", Choice::Energy(9) },
    checkin = { "checkin:moved", Choice::Checkin(CheckinStatus::Moved) },
    evening = { "evening:partial", Choice::Evening(DayStatus::Partial) },
    deeper = { "deeper", Choice::Deeper },
    deeper_done = { "deeper:done", Choice::DeeperDone },
    start = { " start ", Choice::Start },
    later = { "later", Choice::Later },
    todo_done = { "todo:done:3", Choice::TodoDone(3) },
    todo_carry = { "todo:carry:10", Choice::TodoCarry(10) },
)]
fn parses_choices(payload: &str, expected: Choice) {
    assert_eq!(payload.parse::<Choice>(), Ok(expected));
}

#[parameterized(
    unknown = { "dance" },
    bad_focus = { "focus:C" },
    bad_energy = { "energy:lots" },
    negative_energy = { "energy:-1" },
    bad_checkin = { "checkin:maybe" },
    unknown_prefix = { "mood:good" },
    todo_without_number = { "todo:done" },
    todo_bad_action = { "todo:drop:1" },
    todo_bad_number = { "todo:done:x" },
)]
fn rejects_bad_choices(payload: &str) {
    assert!(matches!(
        payload.parse::<Choice>(),
        Err(InputError::InvalidChoice(_))
    ));
}

#[test]
fn payload_round_trips_through_parse() {
    let choices = [
        Choice::Focus(FocusChoice::B),
        Choice::Energy(2),
        Choice::Checkin(CheckinStatus::Help),
        Choice::Evening(DayStatus::Fail),
        Choice::DeeperDone,
        Choice::TodoCarry(4),
    ];
    for choice in choices {
        assert_eq!(choice.payload().parse::<Choice>(), Ok(choice));
    }
}

#[test]
fn deeper_reply_continues_by_default() {
    let reply: DeeperReply = serde_json::from_str(r#"{"reply": "Go on."}"#).unwrap();
    assert!(reply.should_continue);
}
