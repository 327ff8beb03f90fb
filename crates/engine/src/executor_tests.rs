// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_adapters::{FakeInference, FakeNotifyAdapter, InferenceError};
use dl_core::{AnalysisRequest, CycleId, DeeperRequest, Prompt, Tone, UserId};

fn executor(timeout: Duration) -> (Executor<FakeNotifyAdapter, FakeInference>, FakeNotifyAdapter, FakeInference) {
    let notify = FakeNotifyAdapter::new();
    let inference = FakeInference::new();
    (
        Executor::new(notify.clone(), inference.clone(), timeout),
        notify,
        inference,
    )
}

fn analyze() -> Effect {
    Effect::Analyze {
        user_id: UserId::from("u1"),
        cycle_id: CycleId::from("c1"),
        request: AnalysisRequest {
            dump: "a long list of worries".to_string(),
            tone: Tone::Neutral,
            life_areas: Vec::new(),
            weekly_focus: None,
            monthly_focus: None,
        },
    }
}

#[tokio::test]
async fn notify_renders_with_tone() {
    let (executor, notify, _) = executor(Duration::from_secs(1));
    let event = executor
        .execute(Effect::Notify {
            user_id: UserId::from("u1"),
            prompt: Prompt::Later,
            tone: Tone::Soft,
        })
        .await
        .unwrap();

    assert!(event.is_none());
    let calls = notify.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].message, Prompt::Later.render(Tone::Soft));
}

#[tokio::test]
async fn notify_failure_is_an_error() {
    let (executor, notify, _) = executor(Duration::from_secs(1));
    notify.set_failing(true);
    let result = executor
        .execute(Effect::Notify {
            user_id: UserId::from("u1"),
            prompt: Prompt::Later,
            tone: Tone::Neutral,
        })
        .await;
    assert!(matches!(result, Err(ExecuteError::Notify(_))));
}

#[tokio::test]
async fn analysis_comes_back_as_event() {
    let (executor, _, inference) = executor(Duration::from_secs(1));
    let event = executor.execute(analyze()).await.unwrap();

    match event {
        Some(CycleEvent::AnalysisFinished {
            cycle_id, outcome, ..
        }) => {
            assert_eq!(cycle_id, CycleId::from("c1"));
            assert_eq!(outcome.unwrap(), FakeInference::default_analysis());
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(inference.calls().len(), 1);
}

#[tokio::test]
async fn slow_inference_times_out() {
    let (executor, _, inference) = executor(Duration::from_millis(20));
    inference.set_delay(Some(Duration::from_secs(5)));

    let event = executor.execute(analyze()).await.unwrap();
    assert!(matches!(
        event,
        Some(CycleEvent::AnalysisFinished {
            outcome: Err(InferenceFailure::Timeout),
            ..
        })
    ));
}

#[tokio::test]
async fn provider_error_becomes_failure() {
    let (executor, _, inference) = executor(Duration::from_secs(1));
    inference.push_reply(Err(InferenceError::Failed("overloaded".to_string())));

    let event = executor
        .execute(Effect::DeeperTurn {
            user_id: UserId::from("u1"),
            cycle_id: CycleId::from("c1"),
            request: DeeperRequest {
                transcript: Vec::new(),
                tone: Tone::Neutral,
                context: None,
            },
        })
        .await
        .unwrap();

    match event {
        Some(CycleEvent::DeeperReplied {
            outcome: Err(InferenceFailure::Provider(msg)),
            ..
        }) => assert!(msg.contains("overloaded")),
        other => panic!("unexpected event: {:?}", other),
    }
}
