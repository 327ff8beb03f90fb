// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]
#![allow(deprecated)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated state directory; every `dl` built from it talks to its own daemon.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn state_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("dld.sock")
    }

    /// A `dl` command bound to this environment
    pub fn dl(&self) -> Command {
        let mut cmd = Command::cargo_bin("dl").expect("dl binary");
        cmd.env("DL_STATE_DIR", self.dir.path())
            .env_remove("DL_SOCKET_DIR")
            .env_remove("DL_CONFIG")
            .env("DL_TIMEOUT_CONNECT_MS", "10000")
            .env("DL_LOG", "warn");
        if let Some(dld) = dld_binary() {
            cmd.env("DL_DAEMON_BINARY", dld);
        }
        cmd
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if self.socket_path().exists() {
            let _ = self.dl().args(["daemon", "stop"]).ok();
        }
    }
}

/// The daemon binary next to `dl`, when the workspace has built it
pub fn dld_binary() -> Option<PathBuf> {
    let dl = assert_cmd::cargo::cargo_bin("dl");
    let dld = dl.with_file_name(format!("dld{}", std::env::consts::EXE_SUFFIX));
    dld.exists().then_some(dld)
}
