// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Container runtime collaborator (`docker`)
//!
//! Used for teardown only: the cluster runtime leaves containers, volumes and
//! a network behind when a delete is interrupted, all named with the cluster
//! prefix.

use tracing::info;

use super::reports_absent;
use crate::error::{CorralError, Result};
use crate::process::{run_tool, CommandLine};

/// Names of containers (running or not) whose name starts with `prefix`
pub async fn list_containers(prefix: &str) -> Result<Vec<String>> {
    list(
        CommandLine::new("docker").args([
            "ps",
            "-a",
            "--filter",
            &format!("name={prefix}"),
            "--format",
            "{{.Names}}",
        ]),
    )
    .await
}

/// Image references matching `prefix`
pub async fn list_images(prefix: &str) -> Result<Vec<String>> {
    list(
        CommandLine::new("docker").args([
            "images",
            "--filter",
            &format!("reference={prefix}*"),
            "--format",
            "{{.Repository}}:{{.Tag}}",
        ]),
    )
    .await
}

/// Volume names starting with `prefix`
pub async fn list_volumes(prefix: &str) -> Result<Vec<String>> {
    list(
        CommandLine::new("docker").args([
            "volume",
            "ls",
            "--filter",
            &format!("name={prefix}"),
            "--format",
            "{{.Name}}",
        ]),
    )
    .await
}

/// Custom network names starting with `prefix`
pub async fn list_networks(prefix: &str) -> Result<Vec<String>> {
    list(
        CommandLine::new("docker").args([
            "network",
            "ls",
            "--filter",
            &format!("name={prefix}"),
            "--format",
            "{{.Name}}",
        ]),
    )
    .await
}

/// Force-remove a container. `Ok(false)` means it was already absent.
pub async fn remove_container(name: &str) -> Result<bool> {
    remove(CommandLine::new("docker").args(["rm", "-f", name]), name).await
}

/// Remove an image. `Ok(false)` means it was already absent.
pub async fn remove_image(reference: &str) -> Result<bool> {
    remove(CommandLine::new("docker").args(["rmi", reference]), reference).await
}

/// Remove a volume. `Ok(false)` means it was already absent.
pub async fn remove_volume(name: &str) -> Result<bool> {
    remove(CommandLine::new("docker").args(["volume", "rm", name]), name).await
}

/// Remove a custom network. `Ok(false)` means it was already absent.
pub async fn remove_network(name: &str) -> Result<bool> {
    remove(CommandLine::new("docker").args(["network", "rm", name]), name).await
}

async fn list(cmd: CommandLine) -> Result<Vec<String>> {
    let stdout = run_tool(&cmd).await?.require_success(&cmd)?;
    Ok(parse_lines(&stdout))
}

async fn remove(cmd: CommandLine, target: &str) -> Result<bool> {
    match run_tool(&cmd).await?.require_success(&cmd) {
        Ok(_) => {
            info!("removed {}", target);
            Ok(true)
        }
        Err(CorralError::ToolFailed { detail, .. }) if reports_absent(&detail) => Ok(false),
        Err(CorralError::ToolFailed { detail, .. }) => Err(CorralError::RemovalFailed {
            resource: target.to_string(),
            reason: detail,
        }),
        Err(e) => Err(e),
    }
}

fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
