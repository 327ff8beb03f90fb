// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User registration and settings commands

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use dl_core::{Stage, Tone, User, UserId};
use dl_daemon::{NewUser, UserPatch, UserSummary};
use serde::Serialize;
use std::fmt;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user and schedule their first morning ping
    Add {
        /// Stable user id (e.g. a chat id)
        id: UserId,
        /// Display name
        #[arg(long)]
        name: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Change a user's settings; timers are rescheduled
    Set {
        id: UserId,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// List registered users
    List,
    /// Show one user's settings
    Show { id: UserId },
}

#[derive(Args)]
pub struct SettingsArgs {
    /// IANA timezone, e.g. Europe/Berlin
    #[arg(long)]
    timezone: Option<String>,
    /// Local morning ping time, HH:MM
    #[arg(long)]
    morning: Option<String>,
    /// Local evening ping time, HH:MM
    #[arg(long)]
    evening: Option<String>,
    /// neutral, soft or strict
    #[arg(long)]
    tone: Option<Tone>,
    /// Life area the user is working on (repeatable)
    #[arg(long = "area")]
    life_areas: Vec<String>,
    /// Current weekly focus; an empty value clears it
    #[arg(long)]
    weekly_focus: Option<String>,
    /// Current monthly focus; an empty value clears it
    #[arg(long)]
    monthly_focus: Option<String>,
}

pub async fn handle(
    command: UserCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        UserCommand::Add { id, name, settings } => {
            let new_user = NewUser {
                id,
                name,
                timezone: settings.timezone,
                morning_ping: settings.morning,
                evening_ping: settings.evening,
                tone: settings.tone,
                life_areas: settings.life_areas,
                weekly_focus: settings.weekly_focus,
                monthly_focus: settings.monthly_focus,
            };
            let (user, first_morning) = client.register_user(new_user).await?;
            output::print(
                &Registered {
                    user: UserView::from(user),
                    first_morning,
                },
                format,
            );
        }

        UserCommand::Set { id, name, settings } => {
            let patch = UserPatch {
                name,
                timezone: settings.timezone,
                morning_ping: settings.morning,
                evening_ping: settings.evening,
                tone: settings.tone,
                life_areas: (!settings.life_areas.is_empty()).then_some(settings.life_areas),
                weekly_focus: settings.weekly_focus,
                monthly_focus: settings.monthly_focus,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass at least one setting");
            }
            match client.update_user(id.clone(), patch).await? {
                Some(user) => output::print(&UserView::from(user), format),
                None => bail!("unknown user: {}", id),
            }
        }

        UserCommand::List => {
            let rows: Vec<UserRow> = client.users().await?.into_iter().map(UserRow).collect();
            let header = format!(
                "{:<16} {:<16} {:<20} {:<24} NEXT TIMER",
                "ID", "NAME", "TIMEZONE", "STAGE"
            );
            output::print_list(&rows, &header, "No users", format);
        }

        UserCommand::Show { id } => match client.user(id.clone()).await? {
            Some(user) => output::print(&UserView::from(user), format),
            None => bail!("unknown user: {}", id),
        },
    }
    Ok(())
}

/// A user as shown to the operator
#[derive(Serialize)]
struct UserView {
    id: UserId,
    name: String,
    timezone: String,
    morning_ping: String,
    evening_ping: String,
    tone: Tone,
    life_areas: Vec<String>,
    weekly_focus: Option<String>,
    monthly_focus: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            timezone: user.timezone.name().to_string(),
            morning_ping: user.morning_ping.format("%H:%M").to_string(),
            evening_ping: user.evening_ping.format("%H:%M").to_string(),
            id: user.id,
            name: user.name,
            tone: user.tone,
            life_areas: user.life_areas,
            weekly_focus: user.weekly_focus,
            monthly_focus: user.monthly_focus,
            created_at: user.created_at,
        }
    }
}

impl fmt::Display for UserView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User: {} ({})", self.id, self.name)?;
        writeln!(f, "  Timezone: {}", self.timezone)?;
        writeln!(f, "  Morning:  {}", self.morning_ping)?;
        writeln!(f, "  Evening:  {}", self.evening_ping)?;
        write!(f, "  Tone:     {}", self.tone)?;
        if !self.life_areas.is_empty() {
            write!(f, "\n  Areas:    {}", self.life_areas.join(", "))?;
        }
        if let Some(focus) = &self.weekly_focus {
            write!(f, "\n  Weekly:   {}", focus)?;
        }
        if let Some(focus) = &self.monthly_focus {
            write!(f, "\n  Monthly:  {}", focus)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Registered {
    #[serde(flatten)]
    user: UserView,
    first_morning: DateTime<Utc>,
}

impl fmt::Display for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.user)?;
        write!(f, "First morning ping: {}", output::timestamp(&self.first_morning))
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct UserRow(UserSummary);

impl fmt::Display for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let u = &self.0;
        let next = u
            .next_timer
            .as_ref()
            .map_or_else(|| "-".to_string(), output::timestamp);
        write!(
            f,
            "{:<16} {:<16} {:<20} {:<24} {}",
            u.id.to_string(),
            u.name,
            u.timezone,
            u.stage.unwrap_or(Stage::Idle).as_str(),
            next
        )
    }
}
