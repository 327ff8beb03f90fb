// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dl_adapters::{CommandInference, OutboxNotifyAdapter, TracedInference, TracedNotifyAdapter};
use dl_core::{Effect, SystemClock, UuidIdGen};
use dl_daemon::protocol::DEFAULT_TIMEOUT;
use dl_daemon::settings::{ConfigError, Settings};
use dl_engine::{Runtime, RuntimeConfig, RuntimeDeps, RuntimeError, Scheduler, SchedulerConfig};
use dl_storage::{Store, StoreConfig, StoreError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::server;

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<
    TracedNotifyAdapter<OutboxNotifyAdapter>,
    TracedInference<CommandInference>,
    SystemClock,
    UuidIdGen,
>;

type DaemonScheduler = Scheduler<
    TracedNotifyAdapter<OutboxNotifyAdapter>,
    TracedInference<CommandInference>,
    SystemClock,
    UuidIdGen,
>;

/// Daemon file layout
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Directory holding the WAL and snapshot
    pub store_path: PathBuf,
    /// TOML settings file
    pub settings_path: PathBuf,
}

impl Config {
    /// Resolve paths from the environment
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let socket_dir = std::env::var_os("DL_SOCKET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.clone());
        let settings_path = std::env::var_os("DL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join("config.toml"));

        Ok(Self {
            socket_path: socket_dir.join("dld.sock"),
            lock_path: state_dir.join("dld.pid"),
            version_path: state_dir.join("dld.version"),
            log_path: state_dir.join("dld.log"),
            store_path: state_dir.join("store"),
            settings_path,
            state_dir,
        })
    }
}

/// What every connection handler shares
pub struct ListenCtx {
    pub settings: Settings,
    /// Runtime for event processing (shared with the scheduler)
    pub runtime: Arc<DaemonRuntime>,
    /// When daemon started
    pub start_time: Instant,
    /// Inference work for the main loop to run
    deferred_tx: mpsc::UnboundedSender<Vec<Effect>>,
    /// Signalled when a client asks the daemon to stop
    pub shutdown: Notify,
}

impl ListenCtx {
    /// Hand inference effects to the main loop; results re-enter the runtime
    pub fn spawn_deferred(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        if self.deferred_tx.send(effects).is_err() {
            warn!("Daemon is stopping, dropping inference work");
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub ctx: Arc<ListenCtx>,
    /// Connections being served
    pub connections: JoinSet<()>,
    /// Inference work started by socket inputs
    pub deferred: JoinSet<()>,
    pub deferred_rx: mpsc::UnboundedReceiver<Vec<Effect>>,
    scheduler_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl DaemonState {
    /// Serve one client without blocking the accept loop
    pub fn spawn_connection(&mut self, stream: UnixStream) {
        let ctx = Arc::clone(&self.ctx);
        self.connections.spawn(async move {
            if let Err(e) = server::handle_connection(&ctx, stream).await {
                error!("Error handling connection: {}", e);
            }
        });
    }

    /// Run inference effects in the background
    pub fn spawn_deferred(&mut self, effects: Vec<Effect>) {
        let runtime = Arc::clone(&self.ctx.runtime);
        self.deferred.spawn(async move {
            runtime.run_deferred(effects).await;
        });
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop the scheduler and wait for its in-flight timers
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.scheduler_task.take() {
            if let Err(e) = task.await {
                warn!("Scheduler task failed: {}", e);
            }
        }

        // 2. Let open connections finish their request
        let drained = tokio::time::timeout(DEFAULT_TIMEOUT, async {
            while self.connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} connection(s)", self.connections.len());
            self.connections.shutdown().await;
        }
        while let Ok(effects) = self.deferred_rx.try_recv() {
            self.spawn_deferred(effects);
        }

        // 3. Give running inference one timeout's worth of time, then abort.
        // An aborted analysis is picked up by recovery on the next start.
        let grace = self.ctx.settings.inference.timeout + Duration::from_secs(1);
        let drained = tokio::time::timeout(grace, async {
            while self.deferred.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} inference task(s)", self.deferred.len());
            self.deferred.shutdown().await;
        }

        // 4. Leave a fresh snapshot behind
        match self.ctx.runtime.store().compact() {
            Ok(sequence) => info!(sequence, "final snapshot written"),
            Err(e) => warn!("Failed to write final snapshot: {}", e),
        }

        // 5. Remove socket, PID and version files
        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        // 6. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Recovery failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure, unless they
            // belong to the daemon that holds the lock
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create directories
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - the store assumes a single writer
    // Not truncated until locked: a losing contender must keep the winner's PID
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load settings BEFORE binding socket (fail fast on a bad config)
    let settings = Settings::load(&config.settings_path)?;

    // 4. Load state from snapshot + WAL
    let store = Arc::new(Store::open(
        &config.store_path,
        StoreConfig {
            snapshot_every: settings.storage.snapshot_every,
        },
    )?);

    info!(
        "Loaded state: {} users, {} active cycles, wal sequence {}",
        store.users().len(),
        store.active_cycles().len(),
        store.sequence()
    );

    // 5. Set up adapters (wrapped with tracing for observability)
    let outbox = settings
        .notify
        .outbox
        .clone()
        .unwrap_or_else(|| config.state_dir.join("outbox.jsonl"));
    let notify = TracedNotifyAdapter::new(OutboxNotifyAdapter::new(outbox));
    let inference = match &settings.inference.command {
        Some(command) => CommandInference::new(command, settings.inference.args.clone())
            .with_model(settings.inference.model.clone()),
        None => {
            warn!("No [inference] command configured; analyses will fail");
            CommandInference::disabled()
        }
    };

    let runtime = Arc::new(Runtime::new(
        RuntimeDeps {
            store,
            notify,
            inference: TracedInference::new(inference),
        },
        SystemClock,
        UuidIdGen,
        RuntimeConfig {
            cycle: settings.cycle.clone(),
            inference_timeout: settings.inference.timeout,
        },
    ));

    // 6. Reconcile users who were mid-cycle when the daemon stopped
    let recovered = runtime.recover().await?;
    if recovered > 0 {
        info!("Recovered {} user(s) from previous run", recovered);
    }

    // 7. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 8. Start the scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler: Arc<DaemonScheduler> = Arc::new(Scheduler::new(
        Arc::clone(&runtime),
        SchedulerConfig {
            poll_interval: settings.scheduler.poll_interval,
        },
    ));
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    info!("Daemon started in {}", config.state_dir.display());

    let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
    let ctx = Arc::new(ListenCtx {
        settings,
        runtime,
        start_time: Instant::now(),
        deferred_tx,
        shutdown: Notify::new(),
    });

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        ctx,
        connections: JoinSet::new(),
        deferred: JoinSet::new(),
        deferred_rx,
        scheduler_task: Some(scheduler_task),
        shutdown_tx,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [
        &config.socket_path,
        &config.version_path,
        &config.lock_path,
    ] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the state directory for dayloop
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = std::env::var_os("DL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("dayloop"));
    }

    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/dayloop"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
