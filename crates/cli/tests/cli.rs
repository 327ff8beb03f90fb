// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests that need no daemon.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    let env = TestEnv::new();
    env.dl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon"))
        .stdout(predicate::str::contains("choose"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("events"));
}

#[test]
fn user_add_help_shows_settings() {
    let env = TestEnv::new();
    env.dl()
        .args(["user", "add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timezone"))
        .stdout(predicate::str::contains("--morning"))
        .stdout(predicate::str::contains("--tone"));
}

#[test]
fn completions_are_generated() {
    let env = TestEnv::new();
    env.dl()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_dl"));
}

#[test]
fn invalid_choice_is_refused_without_starting_the_daemon() {
    let env = TestEnv::new();
    env.dl()
        .args(["choose", "42", "focus:C"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown choice: focus:C"));
    assert!(!env.socket_path().exists());
}

#[test]
fn invalid_tone_is_a_usage_error() {
    let env = TestEnv::new();
    env.dl()
        .args(["user", "add", "42", "--name", "Ana", "--tone", "harsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tone: harsh"));
}

#[test]
fn queries_need_a_running_daemon() {
    let env = TestEnv::new();
    env.dl()
        .args(["status", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("daemon is not running"))
        .stderr(predicate::str::contains("dl daemon start"));
}

#[test]
fn daemon_status_reports_not_running() {
    let env = TestEnv::new();
    env.dl()
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));

    let output = env
        .dl()
        .args(["daemon", "status", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["running"], false);
}

#[test]
fn daemon_stop_without_daemon_is_harmless() {
    let env = TestEnv::new();
    std::fs::write(env.state_dir().join("dld.pid"), "999999\n").unwrap();
    env.dl()
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
    assert!(!env.state_dir().join("dld.pid").exists());
}

#[test]
fn daemon_logs_without_log_file() {
    let env = TestEnv::new();
    env.dl()
        .args(["daemon", "logs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No log file"));
}
