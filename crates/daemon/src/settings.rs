// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon settings loaded from `config.toml` in the state directory.
//!
//! Every section and field is optional; a missing file means defaults.

use crate::protocol::NewUser;
use chrono::{DateTime, Utc};
use dl_core::{parse_local_time, parse_timezone, CalendarError, CycleConfig, Tone, User};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Invalid config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Invalid [defaults]: {0}")]
    Defaults(#[from] CalendarError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cycle: CycleConfig,
    pub inference: InferenceSettings,
    pub scheduler: SchedulerSettings,
    pub storage: StorageSettings,
    pub defaults: UserDefaults,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceSettings {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// External program speaking JSON on stdin/stdout; unset disables inference
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    pub model: Option<String>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            command: None,
            args: Vec::new(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// WAL entries between snapshots; 0 disables automatic compaction
    pub snapshot_every: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { snapshot_every: 500 }
    }
}

/// Values for registration fields the client leaves out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserDefaults {
    pub timezone: String,
    pub morning_ping: String,
    pub evening_ping: String,
    pub tone: Tone,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            timezone: "Europe/Moscow".to_string(),
            morning_ping: "09:00".to_string(),
            evening_ping: "21:00".to_string(),
            tone: Tone::Neutral,
        }
    }
}

impl UserDefaults {
    /// Check that the defaults parse, so bad values fail at startup
    pub fn validate(&self) -> Result<(), CalendarError> {
        parse_timezone(&self.timezone)?;
        parse_local_time(&self.morning_ping)?;
        parse_local_time(&self.evening_ping)?;
        Ok(())
    }

    pub fn build_user(&self, new: NewUser, now: DateTime<Utc>) -> Result<User, CalendarError> {
        let timezone = new.timezone.as_deref().unwrap_or(&self.timezone);
        let morning = new.morning_ping.as_deref().unwrap_or(&self.morning_ping);
        let evening = new.evening_ping.as_deref().unwrap_or(&self.evening_ping);

        Ok(User {
            id: new.id,
            name: new.name,
            timezone: parse_timezone(timezone)?,
            morning_ping: parse_local_time(morning)?,
            evening_ping: parse_local_time(evening)?,
            tone: new.tone.unwrap_or(self.tone),
            life_areas: new.life_areas,
            weekly_focus: new.weekly_focus.filter(|f| !f.trim().is_empty()),
            monthly_focus: new.monthly_focus.filter(|f| !f.trim().is_empty()),
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifySettings {
    /// JSON-lines outbox tailed by the messaging bridge (default: `<state>/outbox.jsonl`)
    pub outbox: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `path`, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };
        let settings = Self::parse(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        settings.defaults.validate()?;
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
