// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inference gateway: dump analysis and deeper-session turns

mod command;

pub use command::CommandInference;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeInference, InferenceCall};

use async_trait::async_trait;
use dl_core::{Analysis, AnalysisRequest, DeeperReply, DeeperRequest, InferenceFailure};
use thiserror::Error;

/// Errors from an inference provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("no inference provider configured")]
    NotConfigured,
    #[error("could not start provider: {0}")]
    Spawn(String),
    #[error("provider failed: {0}")]
    Failed(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<InferenceError> for InferenceFailure {
    fn from(e: InferenceError) -> Self {
        InferenceFailure::Provider(e.to_string())
    }
}

#[async_trait]
pub trait InferenceAdapter: Clone + Send + Sync + 'static {
    /// Extract mirror, tasks and two focus options from a dump
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, InferenceError>;

    /// Produce the next coach turn of a deeper session
    async fn deeper_turn(&self, request: &DeeperRequest) -> Result<DeeperReply, InferenceError>;
}
