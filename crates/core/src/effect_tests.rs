// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn analyze() -> Effect {
    Effect::Analyze {
        user_id: UserId::from("u1"),
        cycle_id: CycleId::from("c1"),
        request: AnalysisRequest {
            dump: "пять задач".to_string(),
            tone: Tone::Soft,
            life_areas: vec![],
            weekly_focus: None,
            monthly_focus: None,
        },
    }
}

#[test]
fn traced_fields_identify_user_and_cycle() {
    let effect = analyze();
    assert_eq!(effect.name(), "analyze");
    let fields = effect.fields();
    assert!(fields.contains(&("user_id", "u1".to_string())));
    assert!(fields.contains(&("cycle_id", "c1".to_string())));
    assert!(fields.contains(&("dump_chars", "10".to_string())));
}

#[test]
fn notify_is_not_inference() {
    let notify = Effect::Notify {
        user_id: UserId::from("u1"),
        prompt: Prompt::DumpReceived,
        tone: Tone::Neutral,
    };
    assert!(!notify.is_inference());
    assert!(analyze().is_inference());
    assert_eq!(notify.fields()[1], ("prompt", "dump_received".to_string()));
}

#[test]
fn analysis_request_wire_shape() {
    let Effect::Analyze { request, .. } = analyze() else {
        panic!("expected analyze");
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["tone"], "soft");
    assert_eq!(json["dump"], "пять задач");
}
