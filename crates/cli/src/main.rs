// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dl - dayloop operator CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod completions;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cycle, daemon, input, user};
use tracing_subscriber::EnvFilter;

use crate::client::DaemonClient;
use crate::completions::CompletionsArgs;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "dl", version, about = "dayloop - daily coaching cycle daemon control")]
struct Cli {
    /// Output format
    #[arg(long, short = 'o', value_enum, global = true, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// User registration and settings
    User(user::UserArgs),
    /// Send a text or voice message as a user
    Send(input::SendArgs),
    /// Press a button as a user
    Choose(input::ChooseArgs),
    /// Show a user's active cycle
    Status(cycle::StatusArgs),
    /// List pending timers
    Timers(cycle::TimersArgs),
    /// Show a user's finished cycles, newest first
    History(cycle::HistoryArgs),
    /// Show a user's analytics events
    Events(cycle::EventsArgs),
    /// Snapshot daemon state and truncate the write-ahead log
    Compact,
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprint!("{}", error::render(&e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    match cli.command {
        // No daemon connection needed
        Commands::Completions(args) => {
            completions::generate_completions::<Cli>(args.shell);
        }
        Commands::Daemon(args) => daemon::handle(args.command, format).await?,

        // Mutating commands start the daemon on demand
        Commands::User(args) => {
            let client = DaemonClient::connect_or_start().await?;
            user::handle(args.command, &client, format).await?;
        }
        Commands::Send(args) => {
            let client = DaemonClient::connect_or_start().await?;
            input::send(args, &client, format).await?;
        }
        Commands::Choose(args) => {
            // Reject bad payloads without touching the daemon
            let payload = input::parse_choice(&args.payload)?;
            let client = DaemonClient::connect_or_start().await?;
            input::choose(args.user, payload, &client, format).await?;
        }
        Commands::Compact => {
            let client = DaemonClient::connect()?;
            let sequence = client.compact().await?;
            match format {
                OutputFormat::Text => println!("Compacted at sequence {}", sequence),
                OutputFormat::Json => {
                    output::print_json(&serde_json::json!({ "sequence": sequence }))
                }
            }
        }

        // Queries need a running daemon
        Commands::Status(args) => {
            let client = DaemonClient::connect()?;
            cycle::status(args, &client, format).await?;
        }
        Commands::Timers(args) => {
            let client = DaemonClient::connect()?;
            cycle::timers(args, &client, format).await?;
        }
        Commands::History(args) => {
            let client = DaemonClient::connect()?;
            cycle::history(args, &client, format).await?;
        }
        Commands::Events(args) => {
            let client = DaemonClient::connect()?;
            cycle::events(args, &client, format).await?;
        }
    }

    Ok(())
}
