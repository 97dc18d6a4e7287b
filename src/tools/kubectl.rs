// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Manifest applier collaborator (`kubectl`)

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::process::{run_tool, CommandLine};

fn kubectl(kubeconfig: &Path) -> CommandLine {
    CommandLine::new("kubectl").env("KUBECONFIG", kubeconfig.display().to_string())
}

/// Apply a manifest file or directory into a namespace
pub async fn apply_manifests(path: &Path, namespace: &str, kubeconfig: &Path) -> Result<()> {
    let cmd = kubectl(kubeconfig).args([
        "apply",
        "-f",
        &path.display().to_string(),
        "-n",
        namespace,
    ]);

    info!("applying manifests from {}", path.display());
    run_tool(&cmd).await?.require_success(&cmd)?;
    Ok(())
}

/// Command line for the port-forward tunnel the supervisor keeps alive
pub fn port_forward_command(
    service: &str,
    namespace: &str,
    local_port: u16,
    remote_port: u16,
    kubeconfig: &Path,
) -> CommandLine {
    kubectl(kubeconfig).args([
        "port-forward",
        &format!("service/{service}"),
        &format!("{local_port}:{remote_port}"),
        "-n",
        namespace,
    ])
}
