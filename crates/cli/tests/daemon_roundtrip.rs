// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests against a real `dld`.
//!
//! Skipped when the daemon binary has not been built alongside `dl`
//! (e.g. `cargo test -p dl-cli` on a clean target directory).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::{dld_binary, TestEnv};
use predicates::prelude::*;

fn json(env: &TestEnv, args: &[&str]) -> serde_json::Value {
    let output = env.dl().args(args).args(["-o", "json"]).output().unwrap();
    assert!(
        output.status.success(),
        "dl {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn register_then_dump_starts_analysis() {
    if dld_binary().is_none() {
        eprintln!("skipping: dld not built");
        return;
    }
    let env = TestEnv::new();

    let user = json(
        &env,
        &["user", "add", "42", "--name", "Ana", "--timezone", "UTC", "--morning", "08:30"],
    );
    assert_eq!(user["id"], "42");
    assert_eq!(user["morning_ping"], "08:30");
    assert_eq!(user["evening_ping"], "21:00");
    assert!(user["first_morning"].as_str().unwrap().contains("08:30:00"));

    let timers = json(&env, &["timers", "42"]);
    assert_eq!(timers.as_array().unwrap().len(), 1);
    assert_eq!(timers[0]["purpose"], "morning_ping");

    let sent = json(
        &env,
        &["send", "42", "Too", "much", "going", "on", "today,", "can't", "think", "straight"],
    );
    assert_eq!(sent["stage"], "analyzing");
    assert!(sent["rejected"].is_null());

    let events = json(&env, &["events", "42"]);
    let kinds: Vec<_> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["user_registered", "dump_created"]);

    env.dl()
        .args(["user", "add", "42", "--name", "Ana"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));

    env.dl()
        .args(["status", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active cycle"));

    env.dl()
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon stopped"));
    assert!(!env.socket_path().exists());
    assert!(env.state_dir().join("store").exists());
}
