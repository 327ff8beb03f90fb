// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::inference::{InferenceAdapter, InferenceError};
use crate::notify::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use dl_core::{Analysis, AnalysisRequest, DeeperReply, DeeperRequest, Message, UserId};
use tracing::Instrument;

/// Wrapper that adds tracing to any NotifyAdapter
#[derive(Clone)]
pub struct TracedNotifyAdapter<N> {
    inner: N,
}

impl<N> TracedNotifyAdapter<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: NotifyAdapter> NotifyAdapter for TracedNotifyAdapter<N> {
    async fn send(&self, user_id: &UserId, message: &Message) -> Result<(), NotifyError> {
        let span = tracing::info_span!("notify.send", %user_id, kind = %message.kind);

        async {
            tracing::debug!(
                text_len = message.text.len(),
                options = message.options.len(),
                "sending"
            );
            let start = std::time::Instant::now();
            let result = self.inner.send(user_id, message).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "sent"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "send failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any InferenceAdapter
#[derive(Clone)]
pub struct TracedInference<I> {
    inner: I,
}

impl<I> TracedInference<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I: InferenceAdapter> InferenceAdapter for TracedInference<I> {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, InferenceError> {
        let span = tracing::info_span!("inference.analyze", tone = %request.tone);

        async {
            tracing::info!(dump_chars = request.dump.chars().count(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.analyze(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(analysis) => tracing::info!(
                    elapsed_ms,
                    tasks = analysis.tasks.len(),
                    anxiety = analysis.anxiety,
                    "analysis complete"
                ),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "analysis failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn deeper_turn(&self, request: &DeeperRequest) -> Result<DeeperReply, InferenceError> {
        let span = tracing::info_span!("inference.deeper_turn", turns = request.transcript.len());

        async {
            let start = std::time::Instant::now();
            let result = self.inner.deeper_turn(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(reply) => tracing::info!(
                    elapsed_ms,
                    should_continue = reply.should_continue,
                    "reply received"
                ),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "deeper turn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
