// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inference through an external command
//!
//! The command receives the request as JSON on stdin and must print the
//! result as JSON on stdout. `DL_INFERENCE_TASK` tells it which task to
//! run (`analyze` or `deeper_turn`); `DL_MODEL` carries the configured
//! model name, if any. The child is killed when the call is dropped, so
//! the caller's timeout bounds it.

use super::{InferenceAdapter, InferenceError};
use async_trait::async_trait;
use dl_core::{Analysis, AnalysisRequest, DeeperReply, DeeperRequest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
struct Program {
    path: PathBuf,
    args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandInference {
    program: Option<Program>,
    model: Option<String>,
}

impl CommandInference {
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: Some(Program {
                path: path.into(),
                args,
            }),
            model: None,
        }
    }

    /// Every call fails with `NotConfigured`
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.program.is_some()
    }

    async fn run<Req, Resp>(&self, task: &str, request: &Req) -> Result<Resp, InferenceError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let program = self.program.as_ref().ok_or(InferenceError::NotConfigured)?;
        let input =
            serde_json::to_vec(request).map_err(|e| InferenceError::Spawn(e.to_string()))?;

        let mut command = Command::new(&program.path);
        command
            .args(&program.args)
            .env("DL_INFERENCE_TASK", task)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(model) = &self.model {
            command.env("DL_MODEL", model);
        }

        let mut child = command
            .spawn()
            .map_err(|e| InferenceError::Spawn(format!("{}: {}", program.path.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| InferenceError::Failed(format!("writing request: {}", e)))?;
            // Dropping stdin closes the pipe so the provider sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| InferenceError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InferenceError::Failed(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl InferenceAdapter for CommandInference {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, InferenceError> {
        self.run("analyze", request).await
    }

    async fn deeper_turn(&self, request: &DeeperRequest) -> Result<DeeperReply, InferenceError> {
        self.run("deeper_turn", request).await
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
