// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daily cycle state
//!
//! One `CycleState` tracks a user's progress through a single day. At most
//! one is active per user; finished or superseded cycles move to history.

use crate::event::InputKind;
use crate::timer::TimerPurpose;
use crate::user::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Maximum number of tasks kept from an analysis
pub const MAX_TASKS: usize = 7;

/// Energy used when the analysis suggests nothing usable
pub const DEFAULT_ENERGY: u8 = 3;

/// Checklist items one cycle can hold
pub const MAX_TODOS: usize = 10;

/// Unique identifier for a cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(pub String);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CycleId {
    fn from(s: String) -> Self {
        CycleId(s)
    }
}

impl From<&str> for CycleId {
    fn from(s: &str) -> Self {
        CycleId(s.to_string())
    }
}

/// Where a user is in the day.
///
/// `Idle` is never stored: it is the absence of an active cycle.
/// `DayComplete` is the terminal stage of an archived cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    AwaitingDump,
    Analyzing,
    AwaitingFocusChoice,
    AwaitingEnergy,
    FocusConfirmed,
    #[serde(rename = "awaiting_checkin_1")]
    AwaitingCheckin1,
    #[serde(rename = "awaiting_checkin_2")]
    AwaitingCheckin2,
    AwaitingEveningReport,
    DayComplete,
    InDeeperSession,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::AwaitingDump => "awaiting_dump",
            Stage::Analyzing => "analyzing",
            Stage::AwaitingFocusChoice => "awaiting_focus_choice",
            Stage::AwaitingEnergy => "awaiting_energy",
            Stage::FocusConfirmed => "focus_confirmed",
            Stage::AwaitingCheckin1 => "awaiting_checkin_1",
            Stage::AwaitingCheckin2 => "awaiting_checkin_2",
            Stage::AwaitingEveningReport => "awaiting_evening_report",
            Stage::DayComplete => "day_complete",
            Stage::InDeeperSession => "in_deeper_session",
        }
    }

    /// Stages before the day's focus is confirmed
    pub fn is_pre_focus(&self) -> bool {
        matches!(
            self,
            Stage::AwaitingDump | Stage::Analyzing | Stage::AwaitingFocusChoice | Stage::AwaitingEnergy
        )
    }

    /// Stages a deeper session may interrupt
    pub fn allows_deeper(&self) -> bool {
        !matches!(
            self,
            Stage::Idle | Stage::Analyzing | Stage::InDeeperSession | Stage::DayComplete
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The morning mind dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dump {
    pub text: String,
    pub kind: InputKind,
    pub submitted_at: DateTime<Utc>,
}

/// One of the two proposed focuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusChoice {
    A,
    B,
}

impl FromStr for FocusChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(FocusChoice::A),
            "B" | "b" => Ok(FocusChoice::B),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FocusChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusChoice::A => f.write_str("A"),
            FocusChoice::B => f.write_str("B"),
        }
    }
}

/// A proposed focus with its first step and fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusOption {
    pub focus: String,
    /// First 30-45 minute step
    #[serde(default)]
    pub step: String,
    /// 10 minute fallback
    #[serde(default)]
    pub plan_b: String,
}

/// Structured result of analyzing a dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Emotion mirror shown back to the user
    pub mirror: String,
    #[serde(default)]
    pub need: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    pub option_a: FocusOption,
    pub option_b: FocusOption,
    #[serde(default = "default_energy")]
    pub suggested_energy: u8,
    /// Anxiety detected: offer a deeper session
    #[serde(default)]
    pub anxiety: bool,
}

fn default_energy() -> u8 {
    DEFAULT_ENERGY
}

impl Analysis {
    /// Clamp provider output into the shape the cycle relies on
    pub fn normalized(mut self) -> Self {
        self.tasks.retain(|t| !t.trim().is_empty());
        self.tasks.truncate(MAX_TASKS);
        self.suggested_energy = if self.suggested_energy == 0 {
            DEFAULT_ENERGY
        } else {
            self.suggested_energy.clamp(1, 5)
        };
        self
    }

    pub fn option(&self, choice: FocusChoice) -> &FocusOption {
        match choice {
            FocusChoice::A => &self.option_a,
            FocusChoice::B => &self.option_b,
        }
    }
}

/// Which of the two daily check-ins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinSlot {
    First,
    Second,
}

impl CheckinSlot {
    pub fn purpose(&self) -> TimerPurpose {
        match self {
            CheckinSlot::First => TimerPurpose::Checkin1,
            CheckinSlot::Second => TimerPurpose::Checkin2,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            CheckinSlot::First => 1,
            CheckinSlot::Second => 2,
        }
    }
}

/// Quick status answer to a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    Done,
    Progress,
    Moved,
    Help,
}

impl CheckinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinStatus::Done => "done",
            CheckinStatus::Progress => "progress",
            CheckinStatus::Moved => "moved",
            CheckinStatus::Help => "help",
        }
    }
}

impl FromStr for CheckinStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(CheckinStatus::Done),
            "progress" => Ok(CheckinStatus::Progress),
            "moved" => Ok(CheckinStatus::Moved),
            "help" => Ok(CheckinStatus::Help),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub slot: CheckinSlot,
    pub status: Option<CheckinStatus>,
    pub text: Option<String>,
    pub at: DateTime<Utc>,
}

/// Overall verdict on the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Done,
    Partial,
    Fail,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Done => "done",
            DayStatus::Partial => "partial",
            DayStatus::Fail => "fail",
        }
    }
}

impl FromStr for DayStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(DayStatus::Done),
            "partial" => Ok(DayStatus::Partial),
            "fail" => Ok(DayStatus::Fail),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveningReport {
    pub status: Option<DayStatus>,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Why a deeper session started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeeperTrigger {
    Anxiety,
    UserRequest,
}

impl DeeperTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeeperTrigger::Anxiety => "anxiety",
            DeeperTrigger::UserRequest => "user_request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Coach,
}

/// One line of a deeper-session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeeperSession {
    pub trigger: DeeperTrigger,
    pub transcript: Vec<Turn>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl DeeperSession {
    /// The user spoke last and no reply has arrived yet
    pub fn awaiting_reply(&self) -> bool {
        !matches!(self.transcript.last(), Some(turn) if turn.speaker == Speaker::Coach)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeeperOutcome {
    Resolved,
    Abandoned,
}

/// A finished deeper session kept on the cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeeperRecord {
    pub session: DeeperSession,
    pub resumed: Stage,
    pub outcome: DeeperOutcome,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    Done,
    /// Moved to the next cycle
    Carried,
}

/// One item of the day's small-task checklist, apart from the focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// 1-based position in the cycle's list; button payloads refer to it
    pub number: u8,
    pub text: String,
    pub status: TodoStatus,
    /// Cycle the item was carried over from
    #[serde(default)]
    pub carried_from: Option<CycleId>,
    pub added_at: DateTime<Utc>,
}

impl TodoItem {
    pub fn is_pending(&self) -> bool {
        self.status == TodoStatus::Pending
    }
}

/// Split a checklist message into items: one per line or comma, bullets
/// stripped, blanks dropped
pub fn parse_todo_lines(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(|chunk| {
            chunk
                .trim()
                .trim_matches(|c: char| matches!(c, '•' | '-' | '–' | '*'))
                .trim()
        })
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    Completed,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleClosure {
    pub reason: Closure,
    pub at: DateTime<Utc>,
}

/// A user's progress through one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub id: CycleId,
    pub user_id: UserId,
    pub cycle_date: NaiveDate,
    pub stage: Stage,
    /// Stage to return to when a deeper session ends (depth 1)
    #[serde(default)]
    pub resume_stage: Option<Stage>,
    #[serde(default)]
    pub dump: Option<Dump>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub chosen_focus: Option<FocusChoice>,
    #[serde(default)]
    pub energy_level: Option<u8>,
    #[serde(default)]
    pub focus_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkin_responses: Vec<CheckinResponse>,
    #[serde(default)]
    pub evening_status: Option<DayStatus>,
    #[serde(default)]
    pub evening_report: Option<EveningReport>,
    #[serde(default)]
    pub deeper: Option<DeeperSession>,
    #[serde(default)]
    pub deeper_history: Vec<DeeperRecord>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    /// Highest attempt handled per timer purpose (duplicate suppression)
    #[serde(default)]
    pub fired: BTreeMap<TimerPurpose, u8>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closure: Option<CycleClosure>,
}

impl CycleState {
    /// A fresh cycle waiting for the morning dump
    pub fn new(id: CycleId, user_id: UserId, cycle_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            cycle_date,
            stage: Stage::AwaitingDump,
            resume_stage: None,
            dump: None,
            analysis: None,
            chosen_focus: None,
            energy_level: None,
            focus_confirmed_at: None,
            checkin_responses: Vec::new(),
            evening_status: None,
            evening_report: None,
            deeper: None,
            deeper_history: Vec::new(),
            todos: Vec::new(),
            fired: BTreeMap::new(),
            started_at: now,
            updated_at: now,
            closure: None,
        }
    }

    pub fn deeper_session_active(&self) -> bool {
        self.stage == Stage::InDeeperSession
    }

    /// The stage the user is logically in, looking through a deeper session
    pub fn effective_stage(&self) -> Stage {
        if self.deeper_session_active() {
            self.resume_stage.unwrap_or_else(|| self.derived_stage())
        } else {
            self.stage
        }
    }

    /// Best-effort stage reconstructed from the recorded data.
    ///
    /// Used only when a resume marker is missing.
    pub fn derived_stage(&self) -> Stage {
        if self.evening_report.is_some() {
            Stage::DayComplete
        } else if self.focus_confirmed_at.is_some() {
            Stage::FocusConfirmed
        } else if self.chosen_focus.is_some() {
            Stage::AwaitingEnergy
        } else if self.analysis.is_some() {
            Stage::AwaitingFocusChoice
        } else {
            Stage::AwaitingDump
        }
    }

    pub fn is_focus_confirmed(&self) -> bool {
        self.focus_confirmed_at.is_some()
    }

    pub fn chosen_option(&self) -> Option<&FocusOption> {
        let choice = self.chosen_focus?;
        self.analysis.as_ref().map(|a| a.option(choice))
    }

    pub fn has_fired(&self, purpose: TimerPurpose, attempt: u8) -> bool {
        self.fired.get(&purpose).is_some_and(|&seen| attempt <= seen)
    }

    pub fn mark_fired(&mut self, purpose: TimerPurpose, attempt: u8) {
        let seen = self.fired.entry(purpose).or_insert(0);
        *seen = (*seen).max(attempt);
    }

    pub fn checkin(&self, slot: CheckinSlot) -> Option<&CheckinResponse> {
        self.checkin_responses.iter().find(|r| r.slot == slot)
    }

    /// A check-in prompt was sent and not answered yet
    pub fn checkin_pending(&self, slot: CheckinSlot) -> bool {
        self.fired.contains_key(&slot.purpose()) && self.checkin(slot).is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub fn pending_todos(&self) -> impl Iterator<Item = &TodoItem> {
        self.todos.iter().filter(|t| t.is_pending())
    }

    pub fn todo_mut(&mut self, number: u8) -> Option<&mut TodoItem> {
        self.todos.iter_mut().find(|t| t.number == number)
    }

    /// Append new items up to [`MAX_TODOS`]; returns how many fit
    pub fn add_todos(&mut self, texts: Vec<String>, now: DateTime<Utc>) -> usize {
        texts
            .into_iter()
            .take_while(|text| self.push_todo(text.clone(), None, now))
            .count()
    }

    /// Take over items left unfinished by an earlier cycle
    pub fn carry_in(&mut self, items: Vec<TodoItem>, now: DateTime<Utc>) -> usize {
        items
            .into_iter()
            .take_while(|item| self.push_todo(item.text.clone(), item.carried_from.clone(), now))
            .count()
    }

    fn push_todo(&mut self, text: String, carried_from: Option<CycleId>, now: DateTime<Utc>) -> bool {
        if self.todos.len() >= MAX_TODOS {
            return false;
        }
        self.todos.push(TodoItem {
            number: self.todos.len() as u8 + 1,
            text,
            status: TodoStatus::Pending,
            carried_from,
            added_at: now,
        });
        true
    }

    /// Items that move to the next cycle when this one closes
    pub fn unfinished_todos(&self) -> Vec<TodoItem> {
        self.todos
            .iter()
            .filter(|t| t.status != TodoStatus::Done)
            .map(|t| TodoItem {
                carried_from: Some(self.id.clone()),
                ..t.clone()
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
