// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `dl` and `dld`
//!
//! One request and one response per connection. Each message is a 4-byte
//! big-endian length followed by that many bytes of JSON.

use chrono::{DateTime, NaiveDate, Utc};
use dl_core::{
    parse_local_time, parse_timezone, AnalyticsEvent, CalendarError, CycleState, InputKind, Stage, TimerId,
    TimerPurpose, Tone, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version reported in the `Hello` handshake
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read/write timeout used by the daemon for a single message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Analytics events returned when a query names no limit
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Messages larger than this are refused before allocation
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Timed out")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello {
        version: String,
    },
    Status,
    /// A message from a user; `received_at` defaults to the daemon's clock
    Input {
        user_id: UserId,
        kind: InputKind,
        payload: String,
        #[serde(default)]
        received_at: Option<DateTime<Utc>>,
    },
    RegisterUser {
        user: NewUser,
    },
    UpdateUser {
        user_id: UserId,
        patch: UserPatch,
    },
    Query {
        query: Query,
    },
    /// Snapshot the state and truncate the WAL
    Compact,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Query {
    User {
        user_id: UserId,
    },
    Users,
    Cycle {
        user_id: UserId,
    },
    /// Pending timers, for one user or everyone
    Timers {
        #[serde(default)]
        user_id: Option<UserId>,
    },
    /// Archived cycles, newest first
    History {
        user_id: UserId,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Most recent analytics events, oldest first
    Events {
        user_id: UserId,
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// Daemon response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Pong,
    Hello {
        version: String,
    },
    ShuttingDown,
    Status {
        uptime_secs: u64,
        users: usize,
        active_cycles: usize,
        pending_timers: usize,
        wal_sequence: u64,
        #[serde(default)]
        next_due: Option<DateTime<Utc>>,
    },
    Input {
        result: InputResult,
    },
    Registered {
        user: Box<User>,
        first_morning: DateTime<Utc>,
    },
    User {
        user: Option<Box<User>>,
    },
    Users {
        users: Vec<UserSummary>,
    },
    Cycle {
        cycle: Option<Box<CycleState>>,
    },
    Timers {
        timers: Vec<TimerSummary>,
    },
    History {
        cycles: Vec<CycleState>,
    },
    Events {
        events: Vec<AnalyticsEvent>,
    },
    Compacted {
        sequence: u64,
    },
    Error {
        message: String,
    },
}

/// What the daemon did with a user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResult {
    pub outcome: String,
    pub stage: Stage,
    /// Why the input was refused, already reported to the user
    #[serde(default)]
    pub rejected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub next_timer: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSummary {
    pub id: TimerId,
    pub user_id: UserId,
    pub purpose: TimerPurpose,
    pub attempt: u8,
    pub cycle_date: NaiveDate,
    /// Due instant resolved against the user's current timezone
    pub due_at: DateTime<Utc>,
}

/// Registration request; unset fields take the daemon's `[defaults]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub morning_ping: Option<String>,
    #[serde(default)]
    pub evening_ping: Option<String>,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub life_areas: Vec<String>,
    #[serde(default)]
    pub weekly_focus: Option<String>,
    #[serde(default)]
    pub monthly_focus: Option<String>,
}

/// Partial user update. An empty focus string clears that focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub morning_ping: Option<String>,
    #[serde(default)]
    pub evening_ping: Option<String>,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub life_areas: Option<Vec<String>>,
    #[serde(default)]
    pub weekly_focus: Option<String>,
    #[serde(default)]
    pub monthly_focus: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == UserPatch::default()
    }

    /// Apply the patch to a copy of `user`; nothing changes on error
    pub fn apply(self, user: &User) -> Result<User, CalendarError> {
        let mut next = user.clone();
        if let Some(name) = self.name {
            next.name = name;
        }
        if let Some(tz) = self.timezone {
            next.timezone = parse_timezone(&tz)?;
        }
        if let Some(time) = self.morning_ping {
            next.morning_ping = parse_local_time(&time)?;
        }
        if let Some(time) = self.evening_ping {
            next.evening_ping = parse_local_time(&time)?;
        }
        if let Some(tone) = self.tone {
            next.tone = tone;
        }
        if let Some(areas) = self.life_areas {
            next.life_areas = areas;
        }
        if let Some(focus) = self.weekly_focus {
            next.weekly_focus = non_empty(focus);
        }
        if let Some(focus) = self.monthly_focus {
            next.monthly_focus = non_empty(focus);
        }
        Ok(next)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Encode a message as JSON (without length prefix)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Decode a JSON message (without length prefix)
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
