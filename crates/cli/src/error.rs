// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use crate::client::ClientError;
use std::fmt;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct DlError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl DlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn daemon_not_running() -> Self {
        DlError::new("The dayloop daemon is not running")
            .with_suggestion("Start it with: dl daemon start")
            .with_suggestion("Check its log with: dl daemon logs")
    }

    pub fn daemon_start_failed(reason: &str) -> Self {
        DlError::new("The dayloop daemon failed to start")
            .with_context(reason.to_string())
            .with_suggestion("Check the settings file: <state dir>/config.toml")
            .with_suggestion("See the full log with: dl daemon logs")
    }

    pub fn unknown_user(detail: &str) -> Self {
        DlError::new(detail.to_string()).with_suggestion("List registered users with: dl user list")
    }
}

impl From<&ClientError> for DlError {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::DaemonNotRunning => DlError::daemon_not_running(),
            ClientError::DaemonStartFailed(reason) => DlError::daemon_start_failed(reason),
            ClientError::DaemonStartTimeout => DlError::new(err.to_string())
                .with_suggestion("Raise DL_TIMEOUT_CONNECT_MS or check: dl daemon logs"),
            ClientError::Rejected(message) if message.starts_with("unknown user") => {
                DlError::unknown_user(message)
            }
            ClientError::Protocol(_) => DlError::new(err.to_string())
                .with_context("The daemon may be busy or from a different version")
                .with_suggestion("Restart it with: dl daemon stop && dl daemon start"),
            _ => DlError::new(err.to_string()),
        }
    }
}

impl fmt::Display for DlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for DlError {}

/// Render any command failure, with suggestions when the cause is known
pub fn render(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        Some(client) => DlError::from(client).to_string(),
        None => match err.downcast_ref::<DlError>() {
            Some(dl) => dl.to_string(),
            None => format!("error: {:#}\n", err),
        },
    }
}
