// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::{Prompt, Tone};
use tempfile::TempDir;

#[tokio::test]
async fn appends_one_record_per_message() {
    let dir = TempDir::new().unwrap();
    let adapter = OutboxNotifyAdapter::new(dir.path().join("out/outbox.jsonl"));

    adapter
        .send(&UserId::from("u1"), &Prompt::DumpReceived.render(Tone::Neutral))
        .await
        .unwrap();
    adapter
        .send(&UserId::from("u2"), &Prompt::Later.render(Tone::Neutral))
        .await
        .unwrap();

    let contents = std::fs::read_to_string(adapter.path()).unwrap();
    let records: Vec<OutboxRecord> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, UserId::from("u1"));
    assert_eq!(records[0].message.kind, "dump_received");
    assert_eq!(records[1].message.kind, "later");
}

#[tokio::test]
async fn concurrent_sends_do_not_interleave() {
    let dir = TempDir::new().unwrap();
    let adapter = OutboxNotifyAdapter::new(dir.path().join("outbox.jsonl"));

    let mut handles = Vec::new();
    for i in 0..20 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move {
            let prompt = Prompt::DeeperReply {
                text: "x".repeat(500 + i),
            };
            adapter
                .send(&UserId::from(format!("u{}", i)), &prompt.render(Tone::Soft))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let contents = std::fs::read_to_string(adapter.path()).unwrap();
    assert_eq!(contents.lines().count(), 20);
    for line in contents.lines() {
        serde_json::from_str::<OutboxRecord>(line).unwrap();
    }
}
