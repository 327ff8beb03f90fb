// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! What the coach says to the user
//!
//! `Prompt` is semantic: it names the moment in the cycle and carries the
//! data needed to talk about it. `Message` is the plain rendering handed to
//! the notifier. Rich formatting and keyboards belong to the messaging
//! bridge, which can key off the reply option payloads.

use crate::cycle::{
    Analysis, CheckinSlot, CheckinStatus, DayStatus, FocusChoice, FocusOption, Stage, TodoItem,
    TodoStatus, MAX_TODOS,
};
use crate::error::{InferenceFailure, InputError};
use crate::event::Choice;
use crate::user::Tone;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Morning {
        name: String,
        weekly_focus: Option<String>,
        restart: bool,
    },
    DumpReceived,
    AnalysisReady {
        analysis: Analysis,
    },
    AnalysisFailed {
        failure: InferenceFailure,
    },
    AskEnergy {
        focus: FocusOption,
        suggested: u8,
    },
    FocusConfirmed {
        focus: FocusOption,
        energy: u8,
        evening_scheduled: bool,
    },
    Checkin {
        slot: CheckinSlot,
        focus: Option<String>,
        late: bool,
    },
    CheckinRecorded {
        slot: CheckinSlot,
        status: Option<CheckinStatus>,
    },
    Evening {
        attempt: u8,
        focus: Option<String>,
    },
    AskEveningText {
        status: DayStatus,
    },
    DayComplete {
        status: Option<DayStatus>,
    },
    DeeperStarted,
    DeeperReply {
        text: String,
    },
    DeeperEnded {
        resumed: Stage,
    },
    DeeperFailed {
        failure: InferenceFailure,
    },
    /// The day's checklist, after a change or as a reminder
    TodoList {
        todos: Vec<TodoItem>,
        added: usize,
        /// Items that did not fit under the cap
        dropped: usize,
    },
    /// Work lost in a restart; ask the user to send the dump again
    ResendDump,
    Later,
    Rejected {
        error: InputError,
    },
}

/// A tappable reply carrying a choice payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub label: String,
    pub payload: String,
}

impl ReplyOption {
    fn new(label: impl Into<String>, choice: Choice) -> Self {
        Self {
            label: label.into(),
            payload: choice.payload(),
        }
    }
}

/// Rendered prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Prompt kind, for bridges that render their own copy
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ReplyOption>,
}

impl Prompt {
    pub fn name(&self) -> &'static str {
        match self {
            Prompt::Morning { .. } => "morning",
            Prompt::DumpReceived => "dump_received",
            Prompt::AnalysisReady { .. } => "analysis_ready",
            Prompt::AnalysisFailed { .. } => "analysis_failed",
            Prompt::AskEnergy { .. } => "ask_energy",
            Prompt::FocusConfirmed { .. } => "focus_confirmed",
            Prompt::Checkin { .. } => "checkin",
            Prompt::CheckinRecorded { .. } => "checkin_recorded",
            Prompt::Evening { .. } => "evening",
            Prompt::AskEveningText { .. } => "ask_evening_text",
            Prompt::DayComplete { .. } => "day_complete",
            Prompt::DeeperStarted => "deeper_started",
            Prompt::DeeperReply { .. } => "deeper_reply",
            Prompt::DeeperEnded { .. } => "deeper_ended",
            Prompt::DeeperFailed { .. } => "deeper_failed",
            Prompt::TodoList { .. } => "todo_list",
            Prompt::ResendDump => "resend_dump",
            Prompt::Later => "later",
            Prompt::Rejected { .. } => "rejected",
        }
    }

    pub fn render(&self, tone: Tone) -> Message {
        Message {
            kind: self.name().to_string(),
            text: self.text(tone),
            options: self.options(),
        }
    }

    pub fn text(&self, tone: Tone) -> String {
        match self {
            Prompt::Morning {
                name,
                weekly_focus,
                restart,
            } => {
                let greeting = match (tone, restart) {
                    (_, true) => format!("Fresh start, {}.", name),
                    (Tone::Soft, false) => format!("Good morning, {}. How are you waking up?", name),
                    (Tone::Strict, false) => format!("Morning, {}. Time to sort the day.", name),
                    (Tone::Neutral, false) => format!("Good morning, {}.", name),
                };
                let mut text = format!(
                    "{} Dump everything on your mind: tasks, worries, plans. Text or voice, no structure needed.",
                    greeting
                );
                if let Some(focus) = weekly_focus {
                    text.push_str(&format!("\nThis week's focus: {}", focus));
                }
                text
            }
            Prompt::DumpReceived => "Got it. Sorting through it now...".to_string(),
            Prompt::AnalysisReady { analysis } => {
                let mut text = analysis.mirror.clone();
                if let Some(need) = &analysis.need {
                    text.push_str(&format!("\nWhat you seem to need: {}", need));
                }
                if !analysis.tasks.is_empty() {
                    text.push_str("\n\nWhat I heard:");
                    for task in &analysis.tasks {
                        text.push_str(&format!("\n- {}", task));
                    }
                }
                text.push_str(&format!(
                    "\n\nPick one focus for today:\nA: {}\nB: {}",
                    analysis.option_a.focus, analysis.option_b.focus
                ));
                if analysis.anxiety {
                    text.push_str("\n\nThere is a lot of tension in this. We can dig into it first if you like.");
                }
                text
            }
            Prompt::AnalysisFailed { failure } => format!(
                "I couldn't process that ({}). Please send your dump again.",
                failure
            ),
            Prompt::AskEnergy { focus, suggested } => format!(
                "Focus: {}\nFirst step: {}\nPlan B: {}\n\nHow much energy do you have, 1 to 5? (I'd guess {})",
                focus.focus, focus.step, focus.plan_b, suggested
            ),
            Prompt::FocusConfirmed {
                focus,
                energy,
                evening_scheduled,
            } => {
                let close = match tone {
                    Tone::Strict => "Go.",
                    Tone::Soft => "You've got this.",
                    Tone::Neutral => "I'll check in later.",
                };
                let mut text = format!("Locked in: {} (energy {}/5). {}", focus.focus, energy, close);
                if !evening_scheduled {
                    text.push_str(" It's late already, so no evening report today.");
                }
                text.push_str("\nAnything small to tick off besides this? Send a list, one per line.");
                text
            }
            Prompt::Checkin { slot, focus, late } => {
                let subject = focus.as_deref().unwrap_or("today's focus");
                let prefix = if *late { "Late check-in" } else { "Check-in" };
                format!("{} {}: how is it going with {}?", prefix, slot.number(), subject)
            }
            Prompt::CheckinRecorded { status, .. } => match status {
                Some(CheckinStatus::Help) => {
                    "Noted. Shrink it: what is the smallest next step, ten minutes or less?".to_string()
                }
                Some(CheckinStatus::Moved) => "Noted. Moving it is a decision too.".to_string(),
                Some(CheckinStatus::Done) => "Done! Nice.".to_string(),
                _ => "Noted, thanks.".to_string(),
            },
            Prompt::Evening { attempt, focus } => {
                let subject = focus.as_deref().unwrap_or("your focus");
                if *attempt <= 1 {
                    format!("Evening wrap-up. How did it go with {}?", subject)
                } else {
                    format!("Reminder: a few words on {} before the day ends?", subject)
                }
            }
            Prompt::AskEveningText { .. } => {
                "Thanks. Now a couple of sentences: what happened, what got in the way?".to_string()
            }
            Prompt::DayComplete { status } => match (status, tone) {
                (Some(DayStatus::Fail), Tone::Strict) => {
                    "Logged. Tomorrow we make the step smaller.".to_string()
                }
                (Some(DayStatus::Fail), _) => {
                    "Logged. Rough days count too. Rest, and we'll go again tomorrow.".to_string()
                }
                _ => "Day logged. See you tomorrow morning.".to_string(),
            },
            Prompt::DeeperStarted => "Let's go deeper. Take your time.".to_string(),
            Prompt::DeeperReply { text } => text.clone(),
            Prompt::DeeperEnded { resumed } => {
                format!("Thanks for going there. Back to the day ({}).", resumed)
            }
            Prompt::DeeperFailed { failure } => format!(
                "I lost the thread ({}). Let's get back to the day.",
                failure
            ),
            Prompt::TodoList {
                todos,
                added,
                dropped,
            } => {
                let mut lines = Vec::new();
                if *added > 0 {
                    lines.push(format!("Added {} to your list.", added));
                }
                if *dropped > 0 {
                    lines.push(format!(
                        "{} didn't fit, the list holds {}.",
                        dropped, MAX_TODOS
                    ));
                }
                for todo in todos {
                    let mark = match todo.status {
                        TodoStatus::Pending => "[ ]",
                        TodoStatus::Done => "[x]",
                        TodoStatus::Carried => "[>]",
                    };
                    lines.push(format!("{} {}. {}", mark, todo.number, todo.text));
                }
                if !todos.iter().any(TodoItem::is_pending) {
                    lines.push("Nothing left on the list.".to_string());
                }
                lines.join("\n")
            }
            Prompt::ResendDump => {
                "I restarted and lost your morning dump mid-analysis. Could you send it again?".to_string()
            }
            Prompt::Later => "Okay. Write whenever you're ready.".to_string(),
            Prompt::Rejected { error } => format!("Hmm: {}.", error),
        }
    }

    pub fn options(&self) -> Vec<ReplyOption> {
        match self {
            Prompt::Morning { .. } => vec![ReplyOption::new("Later", Choice::Later)],
            Prompt::AnalysisReady { analysis } => {
                let mut options = vec![
                    ReplyOption::new("A", Choice::Focus(FocusChoice::A)),
                    ReplyOption::new("B", Choice::Focus(FocusChoice::B)),
                ];
                if analysis.anxiety {
                    options.push(ReplyOption::new("Go deeper", Choice::Deeper));
                }
                options
            }
            Prompt::AskEnergy { .. } => (1..=5)
                .map(|n| ReplyOption::new(n.to_string(), Choice::Energy(n)))
                .collect(),
            Prompt::Checkin { .. } => vec![
                ReplyOption::new("Done", Choice::Checkin(CheckinStatus::Done)),
                ReplyOption::new("In progress", Choice::Checkin(CheckinStatus::Progress)),
                ReplyOption::new("Moved", Choice::Checkin(CheckinStatus::Moved)),
                ReplyOption::new("Need help", Choice::Checkin(CheckinStatus::Help)),
            ],
            Prompt::Evening { .. } => vec![
                ReplyOption::new("Done", Choice::Evening(DayStatus::Done)),
                ReplyOption::new("Partly", Choice::Evening(DayStatus::Partial)),
                ReplyOption::new("Didn't happen", Choice::Evening(DayStatus::Fail)),
            ],
            Prompt::DeeperStarted | Prompt::DeeperReply { .. } => {
                vec![ReplyOption::new("Enough for now", Choice::DeeperDone)]
            }
            Prompt::TodoList { todos, .. } => todos
                .iter()
                .filter(|todo| todo.is_pending())
                .flat_map(|todo| {
                    [
                        ReplyOption::new(
                            format!("Done {}", todo.number),
                            Choice::TodoDone(todo.number),
                        ),
                        ReplyOption::new(
                            format!("Tomorrow {}", todo.number),
                            Choice::TodoCarry(todo.number),
                        ),
                    ]
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
