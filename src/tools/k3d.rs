// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster runtime collaborator (`k3d`)

use std::path::Path;

use tracing::info;

use super::reports_absent;
use crate::error::{CorralError, Result};
use crate::process::{run_tool, CommandLine};

/// Check whether a cluster with this name exists in the runtime
pub async fn cluster_exists(name: &str) -> Result<bool> {
    Ok(list_clusters().await?.iter().any(|c| c == name))
}

/// Names of all clusters the runtime knows about
pub async fn list_clusters() -> Result<Vec<String>> {
    let cmd = CommandLine::new("k3d").args(["cluster", "list", "-o", "json"]);
    let stdout = run_tool(&cmd).await?.require_success(&cmd)?;
    parse_cluster_names(&stdout)
}

/// Create a cluster, optionally from a declarative config file
pub async fn create_cluster(name: &str, config: Option<&Path>) -> Result<()> {
    let mut cmd = CommandLine::new("k3d").args(["cluster", "create", name]);
    if let Some(config) = config {
        cmd = cmd.arg("--config").arg(config.display().to_string());
    }
    // The runtime merges its kubeconfig into the default location by itself;
    // the session keeps its own copy instead (see `write_kubeconfig`).
    cmd = cmd.args(["--kubeconfig-update-default=false", "--kubeconfig-switch-context=false"]);

    info!("creating cluster '{}'", name);
    run_tool(&cmd).await?.require_success(&cmd)?;
    Ok(())
}

/// Destroy a cluster. `Ok(false)` means it was already absent.
pub async fn delete_cluster(name: &str) -> Result<bool> {
    let cmd = CommandLine::new("k3d").args(["cluster", "delete", name]);
    match run_tool(&cmd).await?.require_success(&cmd) {
        Ok(_) => {
            info!("cluster '{}' deleted", name);
            Ok(true)
        }
        Err(CorralError::ToolFailed { detail, .. }) if reports_absent(&detail) => Ok(false),
        Err(CorralError::ToolFailed { detail, .. }) => Err(CorralError::RemovalFailed {
            resource: format!("cluster {name}"),
            reason: detail,
        }),
        Err(e) => Err(e),
    }
}

/// Write the cluster's access credentials to `dest`
pub async fn write_kubeconfig(name: &str, dest: &Path) -> Result<()> {
    let cmd = CommandLine::new("k3d").args(["kubeconfig", "get", name]);
    let kubeconfig = run_tool(&cmd).await?.require_success(&cmd)?;
    std::fs::write(dest, kubeconfig)?;
    info!("kubeconfig for '{}' written to {}", name, dest.display());
    Ok(())
}

fn parse_cluster_names(json: &str) -> Result<Vec<String>> {
    let clusters: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|e| {
        CorralError::PreconditionFailed(format!("unexpected cluster list output: {e}"))
    })?;

    Ok(clusters
        .iter()
        .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
        .map(String::from)
        .collect())
}
