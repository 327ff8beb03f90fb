// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daily cycle state machine
//!
//! [`handle`] is a pure function from `(user, active cycle, event)` to a
//! [`Step`]: the operations to commit and the effects to run afterwards.
//! It never touches storage, the network or the clock; the caller supplies
//! `now` and an id generator through [`Context`].
//!
//! A rejected input produces no operations. The only effect is a prompt
//! telling the user what went wrong.
//!
//! Analytics events ride along as [`Operation::EventLogged`], so they are
//! committed with the change they describe or not at all.

use crate::analytics::{AnalyticsEvent, EventKind};
use crate::clock::delta;
use crate::config::{CycleConfig, LateCheckinPolicy};
use crate::cycle::{
    parse_todo_lines, Analysis, CheckinResponse, CheckinSlot, CheckinStatus, Closure,
    CycleClosure, CycleId, CycleState, DayStatus, DeeperOutcome, DeeperRecord, DeeperSession,
    DeeperTrigger, Dump, EveningReport, FocusChoice, Speaker, Stage, TodoItem, TodoStatus, Turn,
    MAX_TODOS,
};
use crate::effect::{AnalysisRequest, DeeperRequest, Effect};
use crate::error::{InferenceFailure, InputError};
use crate::event::{Choice, CycleEvent, DeeperReply, InputKind, UserInput};
use crate::id::IdGen;
use crate::operation::Operation;
use crate::prompt::Prompt;
use crate::timer::{Due, Timer, TimerPurpose};
use crate::user::User;
use chrono::{DateTime, NaiveDate, Utc};

/// Everything the machine needs besides the cycle and the event
pub struct Context<'a, I: IdGen> {
    pub user: &'a User,
    pub now: DateTime<Utc>,
    pub config: &'a CycleConfig,
    pub ids: &'a I,
    /// Checklist items left over from the user's last closed cycle
    pub carryover: &'a [TodoItem],
}

/// Result of handling one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Committed together as one WAL entry
    pub operations: Vec<Operation>,
    /// Run after the commit, in order
    pub effects: Vec<Effect>,
    pub rejected: Option<InputError>,
    /// Short disposition for logs ("started", "stale", "deferred", ...)
    pub outcome: &'static str,
}

impl Step {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty() && self.effects.is_empty()
    }

    /// The active cycle as written by this step, if it wrote one
    pub fn committed_cycle(&self) -> Option<&CycleState> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::CycleCommit { cycle } => Some(cycle),
            _ => None,
        })
    }
}

/// Apply one event to a user's active cycle
pub fn handle<I: IdGen>(
    ctx: &Context<'_, I>,
    active: Option<&CycleState>,
    event: &CycleEvent,
) -> Step {
    let mut draft = Draft {
        user: ctx.user,
        now: ctx.now,
        config: ctx.config,
        ids: ctx.ids,
        original: active.cloned(),
        cycle: active.cloned(),
        carried: ctx.carryover,
        carryover: ctx.carryover.to_vec(),
        operations: Vec::new(),
        effects: Vec::new(),
    };

    let result = match event {
        CycleEvent::TimerFired { timer } => Ok(draft.on_timer(timer)),
        CycleEvent::Input { input } => draft.on_input(input),
        CycleEvent::AnalysisFinished {
            cycle_id, outcome, ..
        } => Ok(draft.on_analysis(cycle_id, outcome)),
        CycleEvent::DeeperReplied {
            cycle_id, outcome, ..
        } => Ok(draft.on_deeper_reply(cycle_id, outcome)),
        CycleEvent::Recover {
            morning_pending, ..
        } => Ok(draft.on_recover(*morning_pending)),
    };

    match result {
        Ok(outcome) => draft.finish(outcome),
        Err(error) => Step {
            operations: Vec::new(),
            effects: vec![Effect::Notify {
                user_id: ctx.user.id.clone(),
                prompt: Prompt::Rejected {
                    error: error.clone(),
                },
                tone: ctx.user.tone,
            }],
            rejected: Some(error),
            outcome: "rejected",
        },
    }
}

/// Working copy of the cycle plus the output accumulated so far
struct Draft<'a, I: IdGen> {
    user: &'a User,
    now: DateTime<Utc>,
    config: &'a CycleConfig,
    ids: &'a I,
    original: Option<CycleState>,
    cycle: Option<CycleState>,
    carried: &'a [TodoItem],
    carryover: Vec<TodoItem>,
    operations: Vec<Operation>,
    effects: Vec<Effect>,
}

type Handled = Result<&'static str, InputError>;

impl<I: IdGen> Draft<'_, I> {
    fn finish(mut self, outcome: &'static str) -> Step {
        if self.carryover != self.carried {
            self.operations.push(Operation::TodosCarried {
                user_id: self.user.id.clone(),
                todos: std::mem::take(&mut self.carryover),
            });
        }
        if self.cycle != self.original {
            if let Some(mut cycle) = self.cycle.take() {
                cycle.updated_at = self.now;
                self.operations.push(Operation::CycleCommit { cycle });
            }
        }
        Step {
            operations: self.operations,
            effects: self.effects,
            rejected: None,
            outcome,
        }
    }

    // -- timers ------------------------------------------------------------

    fn on_timer(&mut self, timer: &Timer) -> &'static str {
        self.operations.push(Operation::TimerConsume {
            user_id: timer.user_id.clone(),
            purpose: timer.purpose,
            timer_id: timer.id.clone(),
        });
        match timer.purpose {
            TimerPurpose::MorningPing => self.on_morning(timer),
            _ => self.on_cycle_timer(timer),
        }
    }

    fn on_morning(&mut self, timer: &Timer) -> &'static str {
        let date = timer.cycle_date;
        if self.user.local_date(self.now) > date {
            let next = self.user.next_morning_date(self.now);
            self.schedule_morning(next);
            return "expired";
        }

        let next = self.next_morning_after(date);
        let (existing, busy) = match &self.cycle {
            Some(cycle) => (Some(cycle.cycle_date), self.deeper_busy(cycle)),
            None => (None, false),
        };
        if existing.is_some_and(|d| d >= date) {
            self.schedule_morning(next);
            return "duplicate";
        }
        if busy {
            self.defer(timer);
            return "deferred";
        }

        self.supersede();
        self.schedule_morning(next);
        self.start_cycle(date);
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.mark_fired(TimerPurpose::MorningPing, timer.attempt);
        }
        self.notify_morning(false);
        "started"
    }

    fn on_cycle_timer(&mut self, timer: &Timer) -> &'static str {
        let Some(cycle) = &self.cycle else {
            return "no_cycle";
        };
        if cycle.cycle_date != timer.cycle_date {
            return "stale";
        }
        if cycle.has_fired(timer.purpose, timer.attempt) {
            return "duplicate";
        }
        if self.now > self.horizon(cycle, timer.purpose) {
            return "expired";
        }
        if cycle.deeper_session_active() {
            if self.deeper_busy(cycle) {
                self.defer(timer);
                return "deferred";
            }
            self.pop_deeper(DeeperOutcome::Abandoned);
        }

        match timer.purpose {
            TimerPurpose::Checkin1 => self.on_checkin_timer(CheckinSlot::First, timer),
            TimerPurpose::Checkin2 => self.on_checkin_timer(CheckinSlot::Second, timer),
            TimerPurpose::EveningPing => self.on_evening_timer(timer),
            TimerPurpose::MorningPing => "ignored",
        }
    }

    /// Latest instant a cycle timer may still fire
    fn horizon(&self, cycle: &CycleState, purpose: TimerPurpose) -> DateTime<Utc> {
        let date = cycle.cycle_date;
        let next_day = date.succ_opt().unwrap_or(date);
        let next_morning = self.user.resolve(self.user.morning_ping_on(next_day));
        let end_of_next_day = self
            .user
            .start_of_day(next_day.succ_opt().unwrap_or(next_day));

        let horizon = match (purpose, self.config.late_checkins) {
            (TimerPurpose::Checkin1 | TimerPurpose::Checkin2, LateCheckinPolicy::Skip) => {
                let evening = self.user.resolve(self.user.evening_ping_on(date));
                match cycle.focus_confirmed_at {
                    Some(confirmed) if evening > confirmed => evening,
                    _ => next_morning,
                }
            }
            _ => next_morning,
        };
        horizon.min(end_of_next_day)
    }

    fn on_checkin_timer(&mut self, slot: CheckinSlot, timer: &Timer) -> &'static str {
        let deliver_late = self.config.late_checkins == LateCheckinPolicy::Deliver;
        let Some(cycle) = self.cycle.as_mut() else {
            return "no_cycle";
        };

        let stage = cycle.stage;
        let on_time = match slot {
            CheckinSlot::First => matches!(stage, Stage::FocusConfirmed | Stage::AwaitingCheckin1),
            CheckinSlot::Second => matches!(
                stage,
                Stage::FocusConfirmed | Stage::AwaitingCheckin1 | Stage::AwaitingCheckin2
            ),
        };
        let late = !on_time
            && deliver_late
            && stage == Stage::AwaitingEveningReport
            && cycle.evening_report.is_none();
        if !on_time && !late {
            return "skipped";
        }

        cycle.mark_fired(timer.purpose, timer.attempt);
        if on_time {
            cycle.stage = match slot {
                CheckinSlot::First => Stage::AwaitingCheckin1,
                CheckinSlot::Second => Stage::AwaitingCheckin2,
            };
        }
        let focus = cycle.chosen_option().map(|o| o.focus.clone());
        self.notify(Prompt::Checkin { slot, focus, late });
        if late {
            "late_checkin"
        } else {
            "checkin"
        }
    }

    fn on_evening_timer(&mut self, timer: &Timer) -> &'static str {
        let skip_late = self.config.late_checkins == LateCheckinPolicy::Skip;
        let Some(cycle) = self.cycle.as_mut() else {
            return "no_cycle";
        };

        let outcome = match cycle.stage {
            Stage::FocusConfirmed | Stage::AwaitingCheckin1 | Stage::AwaitingCheckin2 => {
                cycle.stage = Stage::AwaitingEveningReport;
                "evening"
            }
            Stage::AwaitingEveningReport if cycle.evening_report.is_none() => "evening_reminder",
            _ => return "skipped",
        };
        cycle.mark_fired(TimerPurpose::EveningPing, timer.attempt);
        let focus = cycle.chosen_option().map(|o| o.focus.clone());

        if skip_late && outcome == "evening" {
            self.cancel(TimerPurpose::Checkin1);
            self.cancel(TimerPurpose::Checkin2);
        }
        self.notify(Prompt::Evening {
            attempt: timer.attempt,
            focus,
        });
        self.schedule_reminder(timer);
        outcome
    }

    /// Next evening reminder, anchored to the evening ping time while that
    /// is still possible, otherwise spaced from now by the offset gap
    fn schedule_reminder(&mut self, timer: &Timer) {
        let Some(offset) = self.config.reminder_after(timer.attempt) else {
            return;
        };
        let previous = timer
            .attempt
            .checked_sub(1)
            .and_then(|a| self.config.reminder_after(a))
            .unwrap_or_default();

        let local = self.user.evening_ping_on(timer.cycle_date) + delta(offset);
        let due = if self.user.resolve(local) > self.now {
            Due::Local(local)
        } else {
            Due::At(self.now + delta(offset.saturating_sub(previous)))
        };
        let reminder = Timer::new(
            self.ids.next(),
            self.user.id.clone(),
            TimerPurpose::EveningPing,
            due,
            timer.cycle_date,
        )
        .with_attempt(timer.attempt.saturating_add(1));
        self.schedule(reminder);
    }

    // -- user input --------------------------------------------------------

    fn on_input(&mut self, input: &UserInput) -> Handled {
        let payload = input.payload.trim();
        if payload.is_empty() {
            return Err(InputError::Empty);
        }
        match input.kind {
            InputKind::Choice => {
                let choice: Choice = payload.parse()?;
                self.on_choice(choice)
            }
            InputKind::Text | InputKind::Voice => self.on_text(payload, input.kind),
        }
    }

    fn on_text(&mut self, text: &str, kind: InputKind) -> Handled {
        let today = self.user.local_date(self.now);
        let stale = self
            .cycle
            .as_ref()
            .is_some_and(|c| c.cycle_date < today && c.stage.is_pre_focus());
        if stale {
            self.supersede();
        }
        if self.cycle.is_none() {
            self.start_cycle(today);
        }

        let invalid = || InputError::InvalidChoice(text.to_string());
        match self.stage() {
            Stage::AwaitingDump => self.accept_dump(text, kind),
            Stage::Analyzing => Err(InputError::AnalysisInProgress),
            Stage::AwaitingFocusChoice => {
                let choice: FocusChoice = text.parse().map_err(|_| invalid())?;
                self.choose_focus(choice)
            }
            Stage::AwaitingEnergy => {
                let energy: u8 = text.parse().map_err(|_| invalid())?;
                self.confirm_energy(energy)
            }
            Stage::FocusConfirmed => self.add_todos(text),
            Stage::AwaitingCheckin1 => self.record_checkin(CheckinSlot::First, None, Some(text)),
            Stage::AwaitingCheckin2 => {
                if self
                    .cycle
                    .as_ref()
                    .is_some_and(|c| c.checkin_pending(CheckinSlot::Second))
                {
                    self.record_checkin(CheckinSlot::Second, None, Some(text))
                } else {
                    self.add_todos(text)
                }
            }
            Stage::AwaitingEveningReport => self.complete_day(text),
            Stage::InDeeperSession => self.deeper_text(text),
            stage @ (Stage::Idle | Stage::DayComplete) => Err(InputError::Unexpected { stage }),
        }
    }

    fn on_choice(&mut self, choice: Choice) -> Handled {
        match choice {
            Choice::Focus(focus) => self.choose_focus(focus),
            Choice::Energy(energy) => self.confirm_energy(energy),
            Choice::Checkin(status) => self.checkin_choice(status),
            Choice::Evening(status) => self.evening_choice(status),
            Choice::Deeper => self.enter_deeper(),
            Choice::DeeperDone => {
                if self.stage() != Stage::InDeeperSession {
                    return Err(InputError::NothingPending);
                }
                self.pop_deeper(DeeperOutcome::Resolved);
                Ok("deeper_resolved")
            }
            Choice::Start => self.restart(),
            Choice::Later => {
                self.notify(Prompt::Later);
                Ok("later")
            }
            Choice::TodoDone(number) => self.close_todo(number, TodoStatus::Done),
            Choice::TodoCarry(number) => self.close_todo(number, TodoStatus::Carried),
        }
    }

    fn accept_dump(&mut self, text: &str, kind: InputKind) -> Handled {
        let min = self.config.min_dump_chars;
        if kind == InputKind::Text && text.chars().count() < min {
            return Err(InputError::TooShort { min });
        }

        let now = self.now;
        let cycle = self.cycle_mut()?;
        cycle.dump = Some(Dump {
            text: text.to_string(),
            kind,
            submitted_at: now,
        });
        cycle.stage = Stage::Analyzing;
        let cycle_id = cycle.id.clone();

        let request = AnalysisRequest {
            dump: text.to_string(),
            tone: self.user.tone,
            life_areas: self.user.life_areas.clone(),
            weekly_focus: self.user.weekly_focus.clone(),
            monthly_focus: self.user.monthly_focus.clone(),
        };
        let event = self.event(EventKind::DumpCreated).with("kind", kind.as_str());
        self.log(event);
        self.notify(Prompt::DumpReceived);
        self.effects.push(Effect::Analyze {
            user_id: self.user.id.clone(),
            cycle_id,
            request,
        });
        Ok("dump")
    }

    fn choose_focus(&mut self, choice: FocusChoice) -> Handled {
        let cycle = self.cycle_mut()?;
        match cycle.stage {
            Stage::AwaitingFocusChoice => {}
            _ if cycle.chosen_focus.is_some() => return Err(InputError::FocusAlreadySet),
            stage => return Err(InputError::Unexpected { stage }),
        }
        let Some(analysis) = &cycle.analysis else {
            return Err(InputError::Unexpected { stage: cycle.stage });
        };

        let focus = analysis.option(choice).clone();
        let suggested = analysis.suggested_energy;
        cycle.chosen_focus = Some(choice);
        cycle.stage = Stage::AwaitingEnergy;
        self.notify(Prompt::AskEnergy { focus, suggested });
        Ok("focus_chosen")
    }

    fn confirm_energy(&mut self, energy: u8) -> Handled {
        let now = self.now;
        let cycle = self.cycle_mut()?;
        if cycle.stage != Stage::AwaitingEnergy {
            return Err(if cycle.is_focus_confirmed() {
                InputError::FocusAlreadySet
            } else {
                InputError::Unexpected { stage: cycle.stage }
            });
        }
        if !(1..=5).contains(&energy) {
            return Err(InputError::EnergyOutOfRange(energy));
        }
        let Some(focus) = cycle.chosen_option().cloned() else {
            return Err(InputError::Unexpected { stage: cycle.stage });
        };

        cycle.energy_level = Some(energy);
        cycle.focus_confirmed_at = Some(now);
        cycle.stage = Stage::FocusConfirmed;
        let date = cycle.cycle_date;
        let option = cycle.chosen_focus;
        let todos = cycle.todos.clone();

        let first = self.timer(
            TimerPurpose::Checkin1,
            Due::At(now + delta(self.config.checkin_1_after)),
            date,
        );
        let second = self.timer(
            TimerPurpose::Checkin2,
            Due::At(now + delta(self.config.checkin_2_after)),
            date,
        );
        self.schedule(first);
        self.schedule(second);

        let evening = self.user.evening_ping_on(date);
        let evening_scheduled = self.user.resolve(evening) > now;
        if evening_scheduled {
            let timer = self.timer(TimerPurpose::EveningPing, Due::Local(evening), date);
            self.schedule(timer);
        }

        let mut event = self.event(EventKind::FocusSelected).with("energy", energy);
        if let Some(option) = option {
            event = event.with("option", option);
        }
        self.log(event);
        self.notify(Prompt::FocusConfirmed {
            focus,
            energy,
            evening_scheduled,
        });
        if !todos.is_empty() {
            self.notify_todos(todos, 0, 0);
        }
        Ok("focus_confirmed")
    }

    fn checkin_choice(&mut self, status: CheckinStatus) -> Handled {
        let deliver_late = self.config.late_checkins == LateCheckinPolicy::Deliver;
        let Some(cycle) = &self.cycle else {
            return Err(InputError::NoActiveCycle);
        };
        let slot = match cycle.stage {
            Stage::AwaitingCheckin1 => CheckinSlot::First,
            Stage::AwaitingCheckin2 if cycle.checkin_pending(CheckinSlot::Second) => {
                CheckinSlot::Second
            }
            Stage::AwaitingEveningReport if deliver_late => [CheckinSlot::Second, CheckinSlot::First]
                .into_iter()
                .find(|slot| cycle.checkin_pending(*slot))
                .ok_or(InputError::NothingPending)?,
            _ => return Err(InputError::NothingPending),
        };
        self.record_checkin(slot, Some(status), None)
    }

    fn record_checkin(
        &mut self,
        slot: CheckinSlot,
        status: Option<CheckinStatus>,
        text: Option<&str>,
    ) -> Handled {
        let now = self.now;
        let cycle = self.cycle_mut()?;
        cycle.checkin_responses.push(CheckinResponse {
            slot,
            status,
            text: text.map(String::from),
            at: now,
        });
        if cycle.stage == Stage::AwaitingCheckin1 && slot == CheckinSlot::First {
            cycle.stage = Stage::AwaitingCheckin2;
        }
        let todos = cycle.todos.clone();

        let mut event = self
            .event(EventKind::CheckinDone)
            .with("slot", slot.number());
        if let Some(status) = status {
            event = event.with("status", status.as_str());
        }
        self.log(event);
        self.notify(Prompt::CheckinRecorded { slot, status });
        if todos.iter().any(TodoItem::is_pending) {
            self.notify_todos(todos, 0, 0);
        }
        Ok("checkin_recorded")
    }

    fn evening_choice(&mut self, status: DayStatus) -> Handled {
        let cycle = self.cycle_mut()?;
        if cycle.stage != Stage::AwaitingEveningReport {
            return Err(InputError::NothingPending);
        }
        cycle.evening_status = Some(status);
        self.notify(Prompt::AskEveningText { status });
        Ok("evening_status")
    }

    fn complete_day(&mut self, text: &str) -> Handled {
        let Some(mut cycle) = self.cycle.take() else {
            return Err(InputError::NoActiveCycle);
        };
        let status = cycle.evening_status;
        cycle.evening_report = Some(EveningReport {
            status,
            text: text.to_string(),
            at: self.now,
        });
        cycle.stage = Stage::DayComplete;
        cycle.closure = Some(CycleClosure {
            reason: Closure::Completed,
            at: self.now,
        });
        cycle.updated_at = self.now;
        let date = cycle.cycle_date;

        let mut event = self
            .event(EventKind::EveningReportDone)
            .with_cycle(Some(cycle.id.clone()));
        if let Some(status) = status {
            event = event.with("status", status.as_str());
        }
        self.log(event);
        self.carry_over(&cycle);
        for purpose in TimerPurpose::CYCLE_BOUND {
            self.cancel(purpose);
        }
        self.operations.push(Operation::CycleArchive { cycle });
        let next = self.next_morning_after(date);
        self.schedule_morning(next);
        self.notify(Prompt::DayComplete { status });
        Ok("day_complete")
    }

    fn restart(&mut self) -> Handled {
        let today = self.user.local_date(self.now);
        if let Some(cycle) = &self.cycle {
            if cycle.deeper_session_active() {
                return Err(InputError::AlreadyInDeeper);
            }
            if cycle.is_focus_confirmed() && cycle.cycle_date == today {
                return Err(InputError::FocusAlreadySet);
            }
        }
        self.supersede();
        self.start_cycle(today);
        self.notify_morning(true);
        Ok("restarted")
    }

    // -- deeper sessions ---------------------------------------------------

    fn enter_deeper(&mut self) -> Handled {
        let now = self.now;
        let cycle = self.cycle_mut()?;
        match cycle.stage {
            Stage::InDeeperSession => return Err(InputError::AlreadyInDeeper),
            stage if !stage.allows_deeper() => {
                return Err(InputError::DeeperUnavailable { stage })
            }
            _ => {}
        }

        let anxious = cycle.analysis.as_ref().is_some_and(|a| a.anxiety);
        let trigger = if anxious && cycle.stage == Stage::AwaitingFocusChoice {
            DeeperTrigger::Anxiety
        } else {
            DeeperTrigger::UserRequest
        };
        cycle.resume_stage = Some(cycle.stage);
        cycle.stage = Stage::InDeeperSession;
        cycle.deeper = Some(DeeperSession {
            trigger,
            transcript: Vec::new(),
            started_at: now,
            last_activity: now,
        });
        let cycle_id = cycle.id.clone();
        let context = cycle.analysis.as_ref().map(|a| a.mirror.clone());

        let event = self
            .event(EventKind::DeeperStarted)
            .with("trigger", trigger.as_str());
        self.log(event);
        self.notify(Prompt::DeeperStarted);
        self.effects.push(Effect::DeeperTurn {
            user_id: self.user.id.clone(),
            cycle_id,
            request: DeeperRequest {
                transcript: Vec::new(),
                tone: self.user.tone,
                context,
            },
        });
        Ok("deeper_started")
    }

    fn deeper_text(&mut self, text: &str) -> Handled {
        if self.config.is_exit_word(text) {
            self.pop_deeper(DeeperOutcome::Resolved);
            return Ok("deeper_resolved");
        }

        let now = self.now;
        let cycle = self.cycle_mut()?;
        let stage = cycle.stage;
        let cycle_id = cycle.id.clone();
        let context = cycle.analysis.as_ref().map(|a| a.mirror.clone());
        let Some(session) = cycle.deeper.as_mut() else {
            return Err(InputError::Unexpected { stage });
        };
        session.transcript.push(Turn {
            speaker: Speaker::User,
            text: text.to_string(),
            at: now,
        });
        session.last_activity = now;
        let transcript = session.transcript.clone();

        self.effects.push(Effect::DeeperTurn {
            user_id: self.user.id.clone(),
            cycle_id,
            request: DeeperRequest {
                transcript,
                tone: self.user.tone,
                context,
            },
        });
        Ok("deeper_turn")
    }

    /// End the deeper session and return to the suspended stage
    fn pop_deeper(&mut self, outcome: DeeperOutcome) {
        let now = self.now;
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };
        if let Some(resumed) = end_deeper(cycle, outcome, now) {
            if outcome == DeeperOutcome::Resolved {
                let event = self.event(EventKind::DeeperCompleted);
                self.log(event);
            }
            self.notify(Prompt::DeeperEnded { resumed });
        }
    }

    // -- checklist ---------------------------------------------------------

    fn add_todos(&mut self, text: &str) -> Handled {
        let items = parse_todo_lines(text);
        if items.is_empty() {
            return Err(InputError::Empty);
        }
        let now = self.now;
        let cycle = self.cycle_mut()?;
        if cycle.todos.len() >= MAX_TODOS {
            return Err(InputError::TodoListFull { max: MAX_TODOS });
        }
        let offered = items.len();
        let added = cycle.add_todos(items, now);
        let todos = cycle.todos.clone();

        let event = self.event(EventKind::TodosAdded).with("count", added);
        self.log(event);
        self.notify_todos(todos, added, offered - added);
        Ok("todos_added")
    }

    fn close_todo(&mut self, number: u8, status: TodoStatus) -> Handled {
        let cycle = self.cycle_mut()?;
        let item = cycle
            .todo_mut(number)
            .ok_or(InputError::UnknownTodo(number))?;
        if !item.is_pending() {
            return Err(InputError::TodoClosed(number));
        }
        item.status = status;
        let todos = cycle.todos.clone();

        let (kind, outcome) = match status {
            TodoStatus::Done => (EventKind::TodoDone, "todo_done"),
            _ => (EventKind::TodoCarried, "todo_carried"),
        };
        let event = self.event(kind).with("number", number);
        self.log(event);
        self.notify_todos(todos, 0, 0);
        Ok(outcome)
    }

    /// Queue what `cycle` leaves unfinished for the user's next cycle
    fn carry_over(&mut self, cycle: &CycleState) {
        self.carryover.extend(cycle.unfinished_todos());
        self.carryover.truncate(MAX_TODOS);
    }

    fn notify_todos(&mut self, todos: Vec<TodoItem>, added: usize, dropped: usize) {
        self.notify(Prompt::TodoList {
            todos,
            added,
            dropped,
        });
    }

    // -- inference results -------------------------------------------------

    fn on_analysis(
        &mut self,
        cycle_id: &CycleId,
        outcome: &Result<Analysis, InferenceFailure>,
    ) -> &'static str {
        let Some(cycle) = self
            .cycle
            .as_mut()
            .filter(|c| &c.id == cycle_id && c.stage == Stage::Analyzing)
        else {
            return "stale";
        };

        match outcome {
            Ok(analysis) => {
                let analysis = analysis.clone().normalized();
                cycle.analysis = Some(analysis.clone());
                cycle.stage = Stage::AwaitingFocusChoice;
                self.notify(Prompt::AnalysisReady { analysis });
                "analysis_ready"
            }
            Err(failure) => {
                cycle.analysis = None;
                cycle.dump = None;
                cycle.stage = Stage::AwaitingDump;
                self.notify(Prompt::AnalysisFailed {
                    failure: failure.clone(),
                });
                "analysis_failed"
            }
        }
    }

    fn on_deeper_reply(
        &mut self,
        cycle_id: &CycleId,
        outcome: &Result<DeeperReply, InferenceFailure>,
    ) -> &'static str {
        let now = self.now;
        let Some(cycle) = self
            .cycle
            .as_mut()
            .filter(|c| &c.id == cycle_id && c.deeper_session_active())
        else {
            return "stale";
        };

        match outcome {
            Ok(reply) => {
                if let Some(session) = cycle.deeper.as_mut() {
                    session.transcript.push(Turn {
                        speaker: Speaker::Coach,
                        text: reply.reply.clone(),
                        at: now,
                    });
                    session.last_activity = now;
                }
                self.notify(Prompt::DeeperReply {
                    text: reply.reply.clone(),
                });
                if reply.should_continue {
                    "deeper_reply"
                } else {
                    self.pop_deeper(DeeperOutcome::Resolved);
                    "deeper_resolved"
                }
            }
            Err(failure) => {
                self.notify(Prompt::DeeperFailed {
                    failure: failure.clone(),
                });
                self.pop_deeper(DeeperOutcome::Abandoned);
                "deeper_failed"
            }
        }
    }

    // -- recovery ----------------------------------------------------------

    fn on_recover(&mut self, morning_pending: bool) -> &'static str {
        let mut outcome = "recovered";
        let (analyzing, lost_reply) = match &self.cycle {
            Some(c) => (
                c.stage == Stage::Analyzing,
                c.deeper_session_active() && c.deeper.as_ref().is_some_and(|s| s.awaiting_reply()),
            ),
            None => (false, false),
        };

        if analyzing {
            if let Some(cycle) = self.cycle.as_mut() {
                cycle.stage = Stage::AwaitingDump;
                cycle.dump = None;
            }
            self.notify(Prompt::ResendDump);
            outcome = "resend_dump";
        } else if lost_reply {
            self.pop_deeper(DeeperOutcome::Abandoned);
            outcome = "deeper_abandoned";
        }

        if !morning_pending {
            let date = match &self.cycle {
                Some(cycle) => self.next_morning_after(cycle.cycle_date),
                None => self.user.next_morning_date(self.now),
            };
            self.schedule_morning(date);
        }
        outcome
    }

    // -- helpers -----------------------------------------------------------

    fn stage(&self) -> Stage {
        self.cycle.as_ref().map_or(Stage::Idle, |c| c.stage)
    }

    fn cycle_mut(&mut self) -> Result<&mut CycleState, InputError> {
        self.cycle.as_mut().ok_or(InputError::NoActiveCycle)
    }

    fn start_cycle(&mut self, date: NaiveDate) {
        let id: CycleId = self.ids.next_as();
        let mut cycle = CycleState::new(id, self.user.id.clone(), date, self.now);
        cycle.carry_in(std::mem::take(&mut self.carryover), self.now);
        self.cycle = Some(cycle);
    }

    /// Archive the active cycle unfinished and cancel its timers
    fn supersede(&mut self) {
        let Some(mut cycle) = self.cycle.take() else {
            return;
        };
        end_deeper(&mut cycle, DeeperOutcome::Abandoned, self.now);
        cycle.closure = Some(CycleClosure {
            reason: Closure::Superseded,
            at: self.now,
        });
        cycle.updated_at = self.now;
        self.carry_over(&cycle);
        for purpose in TimerPurpose::CYCLE_BOUND {
            self.cancel(purpose);
        }
        self.operations.push(Operation::CycleArchive { cycle });
    }

    /// A deeper session with recent activity
    fn deeper_busy(&self, cycle: &CycleState) -> bool {
        cycle.deeper_session_active()
            && cycle.deeper.as_ref().is_some_and(|session| {
                self.now - session.last_activity <= delta(self.config.deeper_idle_timeout)
            })
    }

    fn defer(&mut self, timer: &Timer) {
        let deferred = Timer {
            id: self.ids.next().into(),
            due: Due::At(self.now + delta(self.config.deeper_defer)),
            ..timer.clone()
        };
        self.schedule(deferred);
    }

    /// Date of the morning ping that follows a cycle on `date`
    fn next_morning_after(&self, date: NaiveDate) -> NaiveDate {
        let following = date.succ_opt().unwrap_or(date);
        following.max(self.user.next_morning_date(self.now))
    }

    fn timer(&self, purpose: TimerPurpose, due: Due, cycle_date: NaiveDate) -> Timer {
        Timer::new(self.ids.next(), self.user.id.clone(), purpose, due, cycle_date)
    }

    fn schedule(&mut self, timer: Timer) {
        self.operations.push(Operation::TimerSchedule { timer });
    }

    fn schedule_morning(&mut self, date: NaiveDate) {
        let timer = Timer::morning(self.ids.next(), self.user, date);
        self.schedule(timer);
    }

    fn cancel(&mut self, purpose: TimerPurpose) {
        self.operations.push(Operation::TimerCancel {
            user_id: self.user.id.clone(),
            purpose,
        });
    }

    /// Analytics event stamped with the user, the clock and the active cycle
    fn event(&self, kind: EventKind) -> AnalyticsEvent {
        AnalyticsEvent::new(self.user.id.clone(), kind, self.now)
            .with_cycle(self.cycle.as_ref().map(|c| c.id.clone()))
    }

    fn log(&mut self, event: AnalyticsEvent) {
        self.operations.push(Operation::EventLogged { event });
    }

    fn notify(&mut self, prompt: Prompt) {
        self.effects.push(Effect::Notify {
            user_id: self.user.id.clone(),
            prompt,
            tone: self.user.tone,
        });
    }

    fn notify_morning(&mut self, restart: bool) {
        self.notify(Prompt::Morning {
            name: self.user.name.clone(),
            weekly_focus: self.user.weekly_focus.clone(),
            restart,
        });
    }
}

/// Close an open deeper session on `cycle`, returning the resumed stage
fn end_deeper(
    cycle: &mut CycleState,
    outcome: DeeperOutcome,
    now: DateTime<Utc>,
) -> Option<Stage> {
    if !cycle.deeper_session_active() {
        return None;
    }
    let resumed = cycle
        .resume_stage
        .take()
        .unwrap_or_else(|| cycle.derived_stage());
    cycle.stage = resumed;
    if let Some(session) = cycle.deeper.take() {
        cycle.deeper_history.push(DeeperRecord {
            session,
            resumed,
            outcome,
            ended_at: now,
        });
    }
    Some(resumed)
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
