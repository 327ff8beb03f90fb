// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake inference adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{InferenceAdapter, InferenceError};
use async_trait::async_trait;
use dl_core::{Analysis, AnalysisRequest, DeeperReply, DeeperRequest, FocusOption};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded inference call
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceCall {
    Analyze(AnalysisRequest),
    DeeperTurn(DeeperRequest),
}

#[derive(Default)]
struct FakeState {
    analyses: VecDeque<Result<Analysis, InferenceError>>,
    replies: VecDeque<Result<DeeperReply, InferenceError>>,
    calls: Vec<InferenceCall>,
    delay: Option<Duration>,
}

/// Scripted inference: queued results are returned in order, then a
/// canned default.
#[derive(Clone, Default)]
pub struct FakeInference {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_analysis(&self, result: Result<Analysis, InferenceError>) {
        self.lock().analyses.push_back(result);
    }

    pub fn push_reply(&self, result: Result<DeeperReply, InferenceError>) {
        self.lock().replies.push_back(result);
    }

    /// Sleep before answering, for timeout tests
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn calls(&self) -> Vec<InferenceCall> {
        self.lock().calls.clone()
    }

    /// The analysis returned when nothing is queued
    pub fn default_analysis() -> Analysis {
        Analysis {
            mirror: "Sounds like a full head today.".to_string(),
            need: Some("clarity".to_string()),
            tasks: vec!["finish the report".to_string(), "call the bank".to_string()],
            option_a: FocusOption {
                focus: "Finish the report".to_string(),
                step: "Write the outline".to_string(),
                plan_b: "Write the title".to_string(),
            },
            option_b: FocusOption {
                focus: "Call the bank".to_string(),
                step: "Find the number and call".to_string(),
                plan_b: "Save the number".to_string(),
            },
            suggested_energy: 3,
            anxiety: false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl InferenceAdapter for FakeInference {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, InferenceError> {
        let result = {
            let mut inner = self.lock();
            inner.calls.push(InferenceCall::Analyze(request.clone()));
            inner.analyses.pop_front()
        };
        self.pause().await;
        result.unwrap_or_else(|| Ok(Self::default_analysis()))
    }

    async fn deeper_turn(&self, request: &DeeperRequest) -> Result<DeeperReply, InferenceError> {
        let result = {
            let mut inner = self.lock();
            inner.calls.push(InferenceCall::DeeperTurn(request.clone()));
            inner.replies.pop_front()
        };
        self.pause().await;
        result.unwrap_or_else(|| {
            Ok(DeeperReply {
                reply: "What feels heaviest about it?".to_string(),
                should_continue: true,
            })
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
