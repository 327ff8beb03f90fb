// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle commands

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;

use crate::client::{self, ClientError, DaemonClient, DaemonStatus, Paths};
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon
    Start {
        /// Run in the foreground instead of detaching
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon, letting in-flight work finish
    Stop,
    /// Show whether the daemon is running and what it holds
    Status,
    /// Print the daemon log
    Logs {
        /// Number of trailing lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

pub async fn handle(command: DaemonCommand, format: OutputFormat) -> Result<()> {
    match command {
        DaemonCommand::Start { foreground } => start(foreground).await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status(format).await,
        DaemonCommand::Logs { lines } => logs(lines),
    }
}

async fn start(foreground: bool) -> Result<()> {
    if foreground {
        let status = std::process::Command::new(client::find_dld_binary()).status()?;
        if !status.success() {
            anyhow::bail!("dld exited with {}", status);
        }
        return Ok(());
    }

    if let Ok(client) = DaemonClient::connect() {
        if client.ping().await.is_ok() {
            println!("Daemon already running");
            return Ok(());
        }
    }

    let client = DaemonClient::connect_or_start().await?;
    let version = client.hello().await?;
    println!("Daemon started (version {})", version);
    Ok(())
}

async fn stop() -> Result<()> {
    if client::daemon_stop().await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(flatten)]
    status: Option<DaemonStatus>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(status) = &self.status else {
            return write!(f, "Daemon not running");
        };
        match self.pid {
            Some(pid) => writeln!(f, "Daemon running (pid {})", pid)?,
            None => writeln!(f, "Daemon running")?,
        }
        writeln!(f, "  Uptime:         {}", output::duration(status.uptime_secs))?;
        writeln!(f, "  Users:          {}", status.users)?;
        writeln!(f, "  Active cycles:  {}", status.active_cycles)?;
        writeln!(f, "  Pending timers: {}", status.pending_timers)?;
        writeln!(f, "  WAL sequence:   {}", status.wal_sequence)?;
        match &status.next_due {
            Some(at) => write!(f, "  Next due:       {}", output::timestamp(at)),
            None => write!(f, "  Next due:       -"),
        }
    }
}

async fn status(format: OutputFormat) -> Result<()> {
    let paths = Paths::resolve()?;
    let status = match DaemonClient::connect() {
        Ok(client) => match client.status().await {
            Ok(status) => Some(status),
            Err(ClientError::DaemonNotRunning) => None,
            Err(e) => return Err(e.into()),
        },
        Err(ClientError::DaemonNotRunning) => None,
        Err(e) => return Err(e.into()),
    };

    let report = StatusReport {
        running: status.is_some(),
        pid: status.as_ref().and(client::read_daemon_pid(&paths)),
        status,
    };
    output::print(&report, format);
    Ok(())
}

fn logs(lines: usize) -> Result<()> {
    let paths = Paths::resolve()?;
    let content = match std::fs::read_to_string(&paths.log_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No log file at {}", paths.log_path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    Ok(())
}
