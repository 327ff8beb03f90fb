// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deliver user messages the way the chat front-end would

use anyhow::{bail, Result};
use clap::Args;
use dl_core::{Choice, InputKind, UserId};
use dl_daemon::InputResult;
use serde::Serialize;
use std::fmt;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct SendArgs {
    pub user: UserId,
    /// Message text
    #[arg(required = true, trailing_var_arg = true)]
    pub text: Vec<String>,
    /// Deliver as a voice transcript
    #[arg(long)]
    pub voice: bool,
}

#[derive(Args)]
pub struct ChooseArgs {
    pub user: UserId,
    /// Button payload: start, later, deeper, deeper:done, focus:A,
    /// energy:3, checkin:done, evening:partial ...
    pub payload: String,
}

/// Parse a button payload into its canonical wire form
pub fn parse_choice(payload: &str) -> Result<String> {
    let choice: Choice = payload.parse()?;
    Ok(choice.payload())
}

pub async fn send(args: SendArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let text = args.text.join(" ");
    if text.trim().is_empty() {
        bail!("message text is empty");
    }
    let kind = if args.voice {
        InputKind::Voice
    } else {
        InputKind::Text
    };
    let result = client.input(args.user, kind, text).await?;
    output::print(&Delivered(result), format);
    Ok(())
}

/// `payload` must already be normalized by [`parse_choice`]
pub async fn choose(
    user: UserId,
    payload: String,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    let result = client.input(user, InputKind::Choice, payload).await?;
    output::print(&Delivered(result), format);
    Ok(())
}

#[derive(Serialize)]
#[serde(transparent)]
struct Delivered(InputResult);

impl fmt::Display for Delivered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        match &r.rejected {
            Some(reason) => write!(f, "Rejected: {} (stage: {})", reason, r.stage),
            None => write!(f, "{} (stage: {})", r.outcome, r.stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_are_normalized() {
        assert_eq!(parse_choice(" focus:a ").unwrap(), "focus:A");
        assert_eq!(parse_choice("energy:4").unwrap(), "energy:4");
        assert_eq!(parse_choice("deeper:done").unwrap(), "deeper:done");
    }

    #[test]
    fn unknown_choices_fail_before_sending() {
        let err = parse_choice("focus:C").unwrap_err();
        assert_eq!(err.to_string(), "unknown choice: focus:C");
        assert!(parse_choice("snooze").is_err());
    }
}
