// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use dl_adapters::{InferenceAdapter, NotifyAdapter, NotifyError};
use dl_core::{CycleEvent, Effect, InferenceFailure, TracedEffect};
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

/// Errors that can occur during effect execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Executes effects using the configured adapters
pub struct Executor<N, F> {
    notify: N,
    inference: F,
    inference_timeout: Duration,
}

impl<N, F> Executor<N, F>
where
    N: NotifyAdapter,
    F: InferenceAdapter,
{
    pub fn new(notify: N, inference: F, inference_timeout: Duration) -> Self {
        Self {
            notify,
            inference,
            inference_timeout,
        }
    }

    /// Execute a single effect with tracing
    ///
    /// Inference effects always produce the event carrying their result;
    /// failures and timeouts are part of that event, not an error.
    pub async fn execute(&self, effect: Effect) -> Result<Option<CycleEvent>, ExecuteError> {
        let span = tracing::info_span!("effect", effect = effect.name());

        async {
            tracing::info!(fields = ?effect.fields(), "executing");

            let start = std::time::Instant::now();
            let result = self.execute_inner(effect).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(event) => tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    has_event = event.is_some(),
                    "completed"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, effect: Effect) -> Result<Option<CycleEvent>, ExecuteError> {
        match effect {
            Effect::Notify {
                user_id,
                prompt,
                tone,
            } => {
                let message = prompt.render(tone);
                self.notify.send(&user_id, &message).await?;
                Ok(None)
            }

            Effect::Analyze {
                user_id,
                cycle_id,
                request,
            } => {
                let outcome =
                    match tokio::time::timeout(self.inference_timeout, self.inference.analyze(&request))
                        .await
                    {
                        Ok(Ok(analysis)) => Ok(analysis),
                        Ok(Err(e)) => Err(InferenceFailure::from(e)),
                        Err(_) => Err(InferenceFailure::Timeout),
                    };
                Ok(Some(CycleEvent::AnalysisFinished {
                    user_id,
                    cycle_id,
                    outcome,
                }))
            }

            Effect::DeeperTurn {
                user_id,
                cycle_id,
                request,
            } => {
                let outcome = match tokio::time::timeout(
                    self.inference_timeout,
                    self.inference.deeper_turn(&request),
                )
                .await
                {
                    Ok(Ok(reply)) => Ok(reply),
                    Ok(Err(e)) => Err(InferenceFailure::from(e)),
                    Err(_) => Err(InferenceFailure::Timeout),
                };
                Ok(Some(CycleEvent::DeeperReplied {
                    user_id,
                    cycle_id,
                    outcome,
                }))
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
