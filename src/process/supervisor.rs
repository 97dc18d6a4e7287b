// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Crash-restarting supervision of long-lived child processes.
//!
//! The supervisor exclusively owns the child handle; callers interact through
//! [`start`], [`SupervisedHandle::stop`] and [`SupervisedHandle::status`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::command::CommandLine;
use crate::error::{CorralError, Result};

/// Whether a supervised process is relaunched after it exits.
#[derive(Debug, Clone, Copy)]
pub enum RestartPolicy {
    /// Relaunch after every exit, waiting `cooldown` between attempts.
    Always { cooldown: Duration },
    /// Run once; an exit is final.
    Never,
}

/// Lifecycle of a supervised process. `Stopped` is terminal and only
/// reachable through an explicit stop, never through a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Running,
    Exited,
    Stopped,
}

/// Point-in-time snapshot reported by [`SupervisedHandle::status`].
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub state: ProcessState,
    /// Count of crash-restarts observed so far; monotonically increasing.
    pub restart_count: u64,
    pub pid: Option<u32>,
}

struct Shared {
    name: String,
    status: Mutex<ProcessStatus>,
    stop: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: ProcessState, pid: Option<u32>) {
        let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
        status.state = state;
        status.pid = pid;
    }

    fn record_restart(&self) {
        let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
        status.restart_count += 1;
    }
}

/// Stable handle to a supervised process.
pub struct SupervisedHandle {
    shared: Arc<Shared>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SupervisedHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn status(&self) -> ProcessStatus {
        self.shared
            .status
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Stop supervision: terminate the child if alive and suppress any
    /// further restart. Terminal; waits until the watcher has wound down.
    pub async fn stop(&self) {
        self.shared.stop.cancel();
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(watcher) = watcher {
            if let Err(e) = watcher.await {
                warn!("watcher for '{}' ended abnormally: {}", self.shared.name, e);
            }
        }
        self.shared.set_state(ProcessState::Stopped, None);
    }
}

/// Launch `command` under supervision.
///
/// A launch that fails outright (command not found, permission denied) is
/// returned as [`CorralError::LaunchFailed`] and never enters the restart
/// loop. Later exits are handled per `policy` and surface only through
/// [`SupervisedHandle::status`] and the log file at `log_path`.
pub async fn start(
    name: &str,
    command: CommandLine,
    policy: RestartPolicy,
    log_path: PathBuf,
    parent: &CancellationToken,
) -> Result<SupervisedHandle> {
    let shared = Arc::new(Shared {
        name: name.to_string(),
        status: Mutex::new(ProcessStatus {
            state: ProcessState::Starting,
            restart_count: 0,
            pid: None,
        }),
        stop: parent.child_token(),
    });

    let child = spawn_logged(&command, &log_path)?;
    shared.set_state(ProcessState::Running, child.id());
    info!("supervising '{}' (pid {:?})", name, child.id());

    let watcher = tokio::spawn(watch(shared.clone(), child, command, policy, log_path));

    Ok(SupervisedHandle {
        shared,
        watcher: Mutex::new(Some(watcher)),
    })
}

async fn watch(
    shared: Arc<Shared>,
    mut child: Child,
    command: CommandLine,
    policy: RestartPolicy,
    log_path: PathBuf,
) {
    'supervise: loop {
        tokio::select! {
            _ = shared.stop.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill '{}': {}", shared.name, e);
                }
                break 'supervise;
            }
            exit = child.wait() => {
                match exit {
                    Ok(status) => info!("'{}' exited with {}", shared.name, status),
                    Err(e) => warn!("wait on '{}' failed: {}", shared.name, e),
                }
                shared.set_state(ProcessState::Exited, None);

                let cooldown = match policy {
                    RestartPolicy::Never => break 'supervise,
                    RestartPolicy::Always { cooldown } => cooldown,
                };

                shared.set_state(ProcessState::Starting, None);

                // Relaunch after the cool-down; a failed relaunch keeps
                // retrying on the same cadence until stopped.
                loop {
                    tokio::select! {
                        _ = shared.stop.cancelled() => break 'supervise,
                        _ = sleep(cooldown) => {}
                    }
                    match spawn_logged(&command, &log_path) {
                        Ok(next) => {
                            shared.record_restart();
                            shared.set_state(ProcessState::Running, next.id());
                            info!(
                                "restarted '{}' (pid {:?}, restarts {})",
                                shared.name,
                                next.id(),
                                shared.status.lock().unwrap_or_else(|p| p.into_inner()).restart_count
                            );
                            child = next;
                            break;
                        }
                        Err(e) => {
                            warn!("relaunch of '{}' failed: {}", shared.name, e);
                        }
                    }
                }
            }
        }
    }

    // A crash never reaches Stopped; only an explicit stop or a cancelled
    // parent token does.
    if shared.stop.is_cancelled() {
        shared.set_state(ProcessState::Stopped, None);
    }
}

fn spawn_logged(command: &CommandLine, log_path: &Path) -> Result<Child> {
    let mut cmd = command.build();
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| CorralError::LaunchFailed {
        command: command.program.clone(),
        reason: e.to_string(),
    })?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, log_path.to_path_buf(), "out"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, log_path.to_path_buf(), "err"));
    }

    Ok(child)
}

/// Append child output to the log file line by line, labelled by stream.
async fn pump(stream: impl AsyncRead + Unpin, log_path: PathBuf, label: &'static str) {
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .await;

    let mut file = match file {
        Ok(file) => file,
        Err(e) => {
            warn!("cannot open process log {}: {}", log_path.display(), e);
            return;
        }
    };

    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let entry = format!("[{label}] {line}\n");
        if file.write_all(entry.as_bytes()).await.is_err() {
            break;
        }
    }
}
