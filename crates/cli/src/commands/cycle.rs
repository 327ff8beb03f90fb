// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle, timer, history and analytics inspection

use anyhow::Result;
use clap::Args;
use dl_core::{AnalyticsEvent, CycleState, FocusChoice, Stage, TodoStatus, UserId};
use dl_daemon::TimerSummary;
use serde::Serialize;
use std::fmt;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct StatusArgs {
    pub user: UserId,
}

#[derive(Args)]
pub struct TimersArgs {
    /// Only this user's timers
    pub user: Option<UserId>,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub user: UserId,
    /// Show at most this many cycles
    #[arg(short = 'n', long, default_value = "7")]
    pub limit: usize,
}

#[derive(Args)]
pub struct EventsArgs {
    pub user: UserId,
    /// Show at most this many events
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

pub async fn status(args: StatusArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match client.cycle(args.user.clone()).await? {
        Some(cycle) => output::print(&CycleView(cycle), format),
        None => match format {
            OutputFormat::Text => println!("No active cycle for {} ({})", args.user, Stage::Idle),
            OutputFormat::Json => output::print_json(&serde_json::Value::Null),
        },
    }
    Ok(())
}

pub async fn timers(args: TimersArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let rows: Vec<TimerRow> = client
        .timers(args.user)
        .await?
        .into_iter()
        .map(TimerRow)
        .collect();
    let header = format!(
        "{:<22} {:<16} {:<14} {:<8} CYCLE DATE",
        "DUE", "USER", "PURPOSE", "ATTEMPT"
    );
    output::print_list(&rows, &header, "No pending timers", format);
    Ok(())
}

pub async fn history(args: HistoryArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let rows: Vec<HistoryRow> = client
        .history(args.user, Some(args.limit))
        .await?
        .into_iter()
        .map(HistoryRow)
        .collect();
    let header = format!(
        "{:<12} {:<24} {:<8} {:<10} FOCUS",
        "DATE", "STAGE", "ENERGY", "DAY"
    );
    output::print_list(&rows, &header, "No finished cycles", format);
    Ok(())
}

pub async fn events(args: EventsArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let rows: Vec<EventRow> = client
        .events(args.user, Some(args.limit))
        .await?
        .into_iter()
        .map(EventRow)
        .collect();
    let header = format!("{:<22} {:<20} {:<12} DETAILS", "AT", "EVENT", "CYCLE");
    output::print_list(&rows, &header, "No events", format);
    Ok(())
}

/// The focus text the user picked, if the analysis is still around
fn chosen_focus(cycle: &CycleState) -> Option<&str> {
    let analysis = cycle.analysis.as_ref()?;
    let option = match cycle.chosen_focus? {
        FocusChoice::A => &analysis.option_a,
        FocusChoice::B => &analysis.option_b,
    };
    Some(option.focus.as_str())
}

fn lower<T: fmt::Debug>(value: &T) -> String {
    format!("{:?}", value).to_lowercase()
}

#[derive(Serialize)]
#[serde(transparent)]
struct CycleView(CycleState);

impl fmt::Display for CycleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.0;
        writeln!(f, "Cycle: {} ({})", c.id, c.cycle_date)?;
        write!(f, "  Stage:   {}", c.stage)?;
        if let Some(resume) = c.resume_stage {
            write!(f, " (resumes {})", resume)?;
        }
        if let Some(dump) = &c.dump {
            write!(
                f,
                "\n  Dump:    {} chars at {}",
                dump.text.chars().count(),
                output::timestamp(&dump.submitted_at)
            )?;
        }
        if let Some(focus) = chosen_focus(c) {
            write!(f, "\n  Focus:   {}", focus)?;
        }
        if let Some(energy) = c.energy_level {
            write!(f, "\n  Energy:  {}/5", energy)?;
        }
        for response in &c.checkin_responses {
            let status = response.status.as_ref().map_or_else(|| "text".to_string(), lower);
            write!(f, "\n  Checkin: {} {}", lower(&response.slot), status)?;
        }
        if let Some(status) = &c.evening_status {
            write!(f, "\n  Day:     {}", lower(status))?;
        }
        for todo in &c.todos {
            let mark = match todo.status {
                TodoStatus::Pending => ' ',
                TodoStatus::Done => 'x',
                TodoStatus::Carried => '>',
            };
            write!(f, "\n  Todo:    [{}] {}. {}", mark, todo.number, todo.text)?;
        }
        if let Some(deeper) = &c.deeper {
            write!(
                f,
                "\n  Deeper:  {} turns since {}",
                deeper.transcript.len(),
                output::timestamp(&deeper.started_at)
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct TimerRow(TimerSummary);

impl fmt::Display for TimerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.0;
        write!(
            f,
            "{:<22} {:<16} {:<14} {:<8} {}",
            output::timestamp(&t.due_at),
            t.user_id.to_string(),
            t.purpose.as_str(),
            t.attempt,
            t.cycle_date
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct HistoryRow(CycleState);

impl fmt::Display for HistoryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.0;
        let energy = c.energy_level.map_or_else(|| "-".to_string(), |e| e.to_string());
        let day = c.evening_status.as_ref().map_or_else(|| "-".to_string(), lower);
        write!(
            f,
            "{:<12} {:<24} {:<8} {:<10} {}",
            c.cycle_date.to_string(),
            c.stage.as_str(),
            energy,
            day,
            chosen_focus(c).unwrap_or("-")
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct EventRow(AnalyticsEvent);

impl fmt::Display for EventRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.0;
        let cycle = e.cycle_id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
        let details: Vec<String> = e.data.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(
            f,
            "{:<22} {:<20} {:<12} {}",
            output::timestamp(&e.at),
            e.kind.as_str(),
            cycle,
            details.join(" ")
        )
    }
}
