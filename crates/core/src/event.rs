// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events that drive the cycle state machine

use crate::cycle::{Analysis, CheckinStatus, CycleId, DayStatus, FocusChoice};
use crate::error::{InferenceFailure, InputError};
use crate::timer::Timer;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the user's message arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    /// Transcribed upstream; the payload is the transcript
    Voice,
    /// Button press; the payload is a choice string such as `energy:3`
    Choice,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Voice => "voice",
            InputKind::Choice => "choice",
        }
    }
}

/// A message from the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub user_id: UserId,
    pub kind: InputKind,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

/// A parsed button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Focus(FocusChoice),
    Energy(u8),
    Checkin(CheckinStatus),
    Evening(DayStatus),
    Deeper,
    DeeperDone,
    /// Manual morning restart
    Start,
    /// "Not now" on the morning prompt
    Later,
    /// Tick off a checklist item by number
    TodoDone(u8),
    /// Move a checklist item to the next cycle
    TodoCarry(u8),
}

impl Choice {
    /// Wire form, the inverse of `FromStr`
    pub fn payload(&self) -> String {
        match self {
            Choice::Focus(f) => format!("focus:{}", f),
            Choice::Energy(n) => format!("energy:{}", n),
            Choice::Checkin(s) => format!("checkin:{}", checkin_name(*s)),
            Choice::Evening(s) => format!("evening:{}", day_name(*s)),
            Choice::Deeper => "deeper".to_string(),
            Choice::DeeperDone => "deeper:done".to_string(),
            Choice::Start => "start".to_string(),
            Choice::Later => "later".to_string(),
            Choice::TodoDone(n) => format!("todo:done:{}", n),
            Choice::TodoCarry(n) => format!("todo:carry:{}", n),
        }
    }
}

fn checkin_name(status: CheckinStatus) -> &'static str {
    match status {
        CheckinStatus::Done => "done",
        CheckinStatus::Progress => "progress",
        CheckinStatus::Moved => "moved",
        CheckinStatus::Help => "help",
    }
}

fn day_name(status: DayStatus) -> &'static str {
    match status {
        DayStatus::Done => "done",
        DayStatus::Partial => "partial",
        DayStatus::Fail => "fail",
    }
}

impl FromStr for Choice {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || InputError::InvalidChoice(s.to_string());

        let choice = match s.split_once(':') {
            None => match s {
                "deeper" => Choice::Deeper,
                "start" => Choice::Start,
                "later" => Choice::Later,
                _ => return Err(invalid()),
            },
            Some(("focus", v)) => Choice::Focus(v.parse().map_err(|_| invalid())?),
            Some(("energy", v)) => Choice::Energy(v.trim().parse().map_err(|_| invalid())?),
            Some(("checkin", v)) => Choice::Checkin(v.parse().map_err(|_| invalid())?),
            Some(("evening", v)) => Choice::Evening(v.parse().map_err(|_| invalid())?),
            Some(("deeper", "done")) => Choice::DeeperDone,
            Some(("todo", rest)) => {
                let (action, number) = rest.split_once(':').ok_or_else(invalid)?;
                let number: u8 = number.trim().parse().map_err(|_| invalid())?;
                match action {
                    "done" => Choice::TodoDone(number),
                    "carry" => Choice::TodoCarry(number),
                    _ => return Err(invalid()),
                }
            }
            Some(_) => return Err(invalid()),
        };
        Ok(choice)
    }
}

/// The coach's answer inside a deeper session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeeperReply {
    pub reply: String,
    /// `false` ends the session and resumes the interrupted stage
    #[serde(default = "default_continue")]
    pub should_continue: bool,
}

fn default_continue() -> bool {
    true
}

/// Everything that can move a cycle forward
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    TimerFired {
        timer: Timer,
    },
    Input {
        input: UserInput,
    },
    AnalysisFinished {
        user_id: UserId,
        cycle_id: CycleId,
        outcome: Result<Analysis, InferenceFailure>,
    },
    DeeperReplied {
        user_id: UserId,
        cycle_id: CycleId,
        outcome: Result<DeeperReply, InferenceFailure>,
    },
    /// Startup reconciliation after a restart
    Recover {
        user_id: UserId,
        /// Whether a morning ping is already scheduled
        morning_pending: bool,
    },
}

impl CycleEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            CycleEvent::TimerFired { timer } => &timer.user_id,
            CycleEvent::Input { input } => &input.user_id,
            CycleEvent::AnalysisFinished { user_id, .. }
            | CycleEvent::DeeperReplied { user_id, .. }
            | CycleEvent::Recover { user_id, .. } => user_id,
        }
    }

    /// Short name for log spans
    pub fn name(&self) -> &'static str {
        match self {
            CycleEvent::TimerFired { .. } => "timer_fired",
            CycleEvent::Input { .. } => "input",
            CycleEvent::AnalysisFinished { .. } => "analysis_finished",
            CycleEvent::DeeperReplied { .. } => "deeper_replied",
            CycleEvent::Recover { .. } => "recover",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
