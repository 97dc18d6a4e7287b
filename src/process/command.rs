// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! One-shot invocation of external command-line collaborators.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{CorralError, Result};

/// An external command with its arguments and environment overrides.
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub(crate) fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout on success, [`CorralError::ToolFailed`] with the stderr tail otherwise.
    pub fn require_success(self, command: &CommandLine) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(CorralError::ToolFailed {
                command: command.to_string(),
                detail: tail(&self.stderr),
            })
        }
    }
}

/// Run a command to completion, capturing its output.
///
/// A command that cannot be launched at all (not found, permission denied)
/// is a [`CorralError::LaunchFailed`]; a command that runs and exits non-zero
/// is reported through [`ToolOutput::success`] so callers can decide whether
/// that is an error in their context.
pub async fn run_tool(command: &CommandLine) -> Result<ToolOutput> {
    debug!("running: {}", command);

    let output = command
        .build()
        .output()
        .await
        .map_err(|e| CorralError::LaunchFailed {
            command: command.program.clone(),
            reason: e.to_string(),
        })?;

    let result = ToolOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.success {
        debug!("'{}' exited with {:?}", command, output.status.code());
    }

    Ok(result)
}

/// Last few lines of tool stderr, enough to diagnose without flooding logs.
fn tail(stderr: &str) -> String {
    const KEEP: usize = 5;
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(KEEP);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "(no stderr)".to_string()
    } else {
        tail
    }
}
