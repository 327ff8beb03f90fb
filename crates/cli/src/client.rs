// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dl_core::{AnalyticsEvent, CycleState, InputKind, User, UserId};
use dl_daemon::protocol::{self, ProtocolError};
use dl_daemon::{
    InputResult, NewUser, Query, Request, Response, TimerSummary, UserPatch, UserSummary,
};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("DL_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("DL_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("DL_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("DL_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Where the daemon keeps its files; mirrors the daemon's own resolution
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self, ClientError> {
        let state_dir = state_dir()?;
        let socket_dir = std::env::var_os("DL_SOCKET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.clone());
        Ok(Self {
            socket_path: socket_dir.join("dld.sock"),
            pid_path: state_dir.join("dld.pid"),
            version_path: state_dir.join("dld.version"),
            log_path: state_dir.join("dld.log"),
            state_dir,
        })
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        let paths = Paths::resolve()?;

        // Restart a daemon left over from a different version
        if let Ok(daemon_version) = std::fs::read_to_string(&paths.version_path) {
            if daemon_version.trim() != env!("CARGO_PKG_VERSION") {
                tracing::info!(daemon_version = daemon_version.trim(), "restarting daemon");
                let _ = daemon_stop().await;
            }
        }

        match Self::connect() {
            Ok(client) => match client.ping().await {
                // Stale socket left by a daemon that died
                Err(ClientError::DaemonNotRunning) => {}
                _ => return Ok(client),
            },
            Err(ClientError::DaemonNotRunning) => {}
            Err(e) => return Err(wrap_with_startup_error(e, &paths)),
        }

        let child = start_daemon_background()?;
        Self::connect_with_retry(&paths, timeout_connect(), child).await
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect() -> Result<Self, ClientError> {
        let paths = Paths::resolve()?;

        if !paths.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self {
            socket_path: paths.socket_path,
        })
    }

    async fn connect_with_retry(
        paths: &Paths,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Check if daemon process exited early (startup failure)
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(paths) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect() {
                Ok(client) => {
                    // The socket file appears at bind; wait until it answers
                    if client.ping().await.is_ok() {
                        return Ok(client);
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, paths)),
            }
        }

        Err(wrap_with_startup_error(ClientError::DaemonStartTimeout, paths))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            // Stale socket file from a daemon that died
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(ClientError::DaemonNotRunning)
            }
            Err(e) => return Err(e.into()),
        };
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        tracing::debug!(?response, "daemon response");
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    async fn query(&self, query: Query) -> Result<Response, ClientError> {
        match self.send(Request::Query { query }).await? {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            response => Ok(response),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                users,
                active_cycles,
                pending_timers,
                wal_sequence,
                next_due,
            } => Ok(DaemonStatus {
                uptime_secs,
                users,
                active_cycles,
                pending_timers,
                wal_sequence,
                next_due,
            }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Deliver a user message
    pub async fn input(
        &self,
        user_id: UserId,
        kind: InputKind,
        payload: String,
    ) -> Result<InputResult, ClientError> {
        match self
            .send(Request::Input {
                user_id,
                kind,
                payload,
                received_at: None,
            })
            .await?
        {
            Response::Input { result } => Ok(result),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn register_user(
        &self,
        user: NewUser,
    ) -> Result<(User, DateTime<Utc>), ClientError> {
        match self.send(Request::RegisterUser { user }).await? {
            Response::Registered {
                user,
                first_morning,
            } => Ok((*user, first_morning)),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn update_user(
        &self,
        user_id: UserId,
        patch: UserPatch,
    ) -> Result<Option<User>, ClientError> {
        match self.send(Request::UpdateUser { user_id, patch }).await? {
            Response::User { user } => Ok(user.map(|b| *b)),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn user(&self, user_id: UserId) -> Result<Option<User>, ClientError> {
        match self.query(Query::User { user_id }).await? {
            Response::User { user } => Ok(user.map(|b| *b)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>, ClientError> {
        match self.query(Query::Users).await? {
            Response::Users { users } => Ok(users),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// The user's active cycle, if any
    pub async fn cycle(&self, user_id: UserId) -> Result<Option<CycleState>, ClientError> {
        match self.query(Query::Cycle { user_id }).await? {
            Response::Cycle { cycle } => Ok(cycle.map(|b| *b)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn timers(&self, user_id: Option<UserId>) -> Result<Vec<TimerSummary>, ClientError> {
        match self.query(Query::Timers { user_id }).await? {
            Response::Timers { timers } => Ok(timers),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Archived cycles, newest first
    pub async fn history(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<CycleState>, ClientError> {
        match self.query(Query::History { user_id, limit }).await? {
            Response::History { cycles } => Ok(cycles),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Most recent analytics events, oldest first
    pub async fn events(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<AnalyticsEvent>, ClientError> {
        match self.query(Query::Events { user_id, limit }).await? {
            Response::Events { events } => Ok(events),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Snapshot the daemon's state and truncate its WAL
    pub async fn compact(&self) -> Result<u64, ClientError> {
        match self.send(Request::Compact).await? {
            Response::Compacted { sequence } => Ok(sequence),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Daemon status as reported by `Request::Status`
#[derive(Debug, Clone, serde::Serialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub users: usize,
    pub active_cycles: usize,
    pub pending_timers: usize,
    pub wal_sequence: u64,
    pub next_due: Option<DateTime<Utc>>,
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let dld_path = find_dld_binary();

    Command::new(&dld_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", dld_path.display(), e)))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop() -> Result<bool, ClientError> {
    let paths = Paths::resolve()?;
    let client = match DaemonClient::connect() {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(&paths);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;
    if matches!(shutdown_result, Err(ClientError::DaemonNotRunning)) {
        cleanup_stale_pid(&paths);
        return Ok(false);
    }

    if let Some(pid) = read_daemon_pid(&paths) {
        if shutdown_result.is_ok() {
            // The daemon drains in-flight inference before exiting
            wait_for_exit(pid, timeout_exit()).await;
        }

        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(&paths);
    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the dld binary
pub fn find_dld_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Some(path) = std::env::var_os("DL_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Check current executable's directory
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("dld");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("dld")
}

/// Get the state directory for dayloop
fn state_dir() -> Result<PathBuf, ClientError> {
    if let Some(dir) = std::env::var_os("DL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("dayloop"));
    }

    let home = dirs::home_dir().ok_or(ClientError::NoStateDir)?;
    Ok(home.join(".local/state/dayloop"))
}

/// Remove the PID and socket files of a daemon that is gone.
///
/// Only called by daemon_stop, never while a daemon may be starting up.
fn cleanup_stale_pid(paths: &Paths) {
    for path in [&paths.pid_path, &paths.socket_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(paths: &Paths) -> Option<u32> {
    std::fs::read_to_string(&paths.pid_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Startup marker prefix that daemon writes to log before anything else.
/// Full format: "--- dld: starting (pid: 12345)"
const STARTUP_MARKER_PREFIX: &str = "--- dld: starting (pid: ";

/// Read daemon log from startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(paths: &Paths) -> Option<String> {
    let content = std::fs::read_to_string(&paths.log_path).ok()?;

    // Find the last startup marker
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // Format: "timestamp LEVEL target: message"
    let error_messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, paths: &Paths) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error(paths) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
