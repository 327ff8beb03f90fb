// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side effects requested by the cycle state machine
//!
//! The machine never performs I/O. State changes leave it as `Operation`s
//! for the store; everything else leaves as an `Effect` for the executor.

use crate::cycle::{CycleId, Turn};
use crate::prompt::Prompt;
use crate::traced::TracedEffect;
use crate::user::{Tone, UserId};
use serde::{Deserialize, Serialize};

/// Input to dump analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub dump: String,
    pub tone: Tone,
    #[serde(default)]
    pub life_areas: Vec<String>,
    #[serde(default)]
    pub weekly_focus: Option<String>,
    #[serde(default)]
    pub monthly_focus: Option<String>,
}

/// Input to one deeper-session turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeeperRequest {
    pub transcript: Vec<Turn>,
    pub tone: Tone,
    /// What the coach knows about the day so far (the analysis mirror)
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a prompt to the user
    Notify {
        user_id: UserId,
        prompt: Prompt,
        tone: Tone,
    },
    /// Analyze a dump; the result returns as `AnalysisFinished`
    Analyze {
        user_id: UserId,
        cycle_id: CycleId,
        request: AnalysisRequest,
    },
    /// Ask for the next coach turn; the result returns as `DeeperReplied`
    DeeperTurn {
        user_id: UserId,
        cycle_id: CycleId,
        request: DeeperRequest,
    },
}

impl Effect {
    pub fn user_id(&self) -> &UserId {
        match self {
            Effect::Notify { user_id, .. }
            | Effect::Analyze { user_id, .. }
            | Effect::DeeperTurn { user_id, .. } => user_id,
        }
    }

    /// Inference calls run outside the per-user lock
    pub fn is_inference(&self) -> bool {
        matches!(self, Effect::Analyze { .. } | Effect::DeeperTurn { .. })
    }
}

impl TracedEffect for Effect {
    fn name(&self) -> &'static str {
        match self {
            Effect::Notify { .. } => "notify",
            Effect::Analyze { .. } => "analyze",
            Effect::DeeperTurn { .. } => "deeper_turn",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Notify {
                user_id, prompt, ..
            } => vec![
                ("user_id", user_id.to_string()),
                ("prompt", prompt.name().to_string()),
            ],
            Effect::Analyze {
                user_id,
                cycle_id,
                request,
            } => vec![
                ("user_id", user_id.to_string()),
                ("cycle_id", cycle_id.to_string()),
                ("dump_chars", request.dump.chars().count().to_string()),
            ],
            Effect::DeeperTurn {
                user_id,
                cycle_id,
                request,
            } => vec![
                ("user_id", user_id.to_string()),
                ("cycle_id", cycle_id.to_string()),
                ("turns", request.transcript.len().to_string()),
            ],
        }
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
