// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_adapters::{FakeInference, FakeNotifyAdapter};
use dl_core::{Prompt, Tone};
use std::time::Duration;

fn notify(user: &str, prompt: Prompt) -> Effect {
    Effect::Notify {
        user_id: UserId::from(user),
        prompt,
        tone: Tone::Neutral,
    }
}

fn executor(notify: &FakeNotifyAdapter) -> Executor<FakeNotifyAdapter, FakeInference> {
    Executor::new(notify.clone(), FakeInference::new(), Duration::from_secs(1))
}

#[tokio::test]
async fn flush_sends_in_queue_order() {
    let fake = FakeNotifyAdapter::new();
    let executor = executor(&fake);
    let deliveries = Deliveries::new();
    let user = UserId::from("u1");

    deliveries.push(&user, vec![notify("u1", Prompt::DumpReceived)]);
    deliveries.push(
        &user,
        vec![notify("u1", Prompt::Later), notify("u1", Prompt::ResendDump)],
    );
    assert_eq!(deliveries.pending(&user), 3);

    assert_eq!(deliveries.flush(&user, &executor).await, 3);
    assert_eq!(fake.kinds(), vec!["dump_received", "later", "resend_dump"]);
    assert_eq!(deliveries.pending(&user), 0);

    // Nothing left for a second flush
    assert_eq!(deliveries.flush(&user, &executor).await, 0);
    assert_eq!(fake.calls().len(), 3);
}

#[tokio::test]
async fn users_have_separate_queues() {
    let fake = FakeNotifyAdapter::new();
    let executor = executor(&fake);
    let deliveries = Deliveries::new();

    deliveries.push(&UserId::from("u1"), vec![notify("u1", Prompt::Later)]);
    deliveries.push(&UserId::from("u2"), vec![notify("u2", Prompt::DumpReceived)]);

    assert_eq!(deliveries.flush(&UserId::from("u2"), &executor).await, 1);
    assert_eq!(deliveries.pending(&UserId::from("u1")), 1);
    assert_eq!(fake.calls()[0].user_id, UserId::from("u2"));
}

#[tokio::test]
async fn failed_send_does_not_stop_the_queue() {
    let fake = FakeNotifyAdapter::new();
    fake.set_failing(true);
    let executor = executor(&fake);
    let deliveries = Deliveries::new();
    let user = UserId::from("u1");

    deliveries.push(
        &user,
        vec![notify("u1", Prompt::Later), notify("u1", Prompt::DumpReceived)],
    );
    assert_eq!(deliveries.flush(&user, &executor).await, 2);
    assert_eq!(fake.kinds(), vec!["later", "dump_received"]);
}
