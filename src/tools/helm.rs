// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart installer collaborator (`helm`)

use std::path::{Path, PathBuf};

use tracing::info;

use super::reports_absent;
use crate::error::{CorralError, Result};
use crate::process::{run_tool, CommandLine};

fn helm(kubeconfig: &Path) -> CommandLine {
    CommandLine::new("helm").env("KUBECONFIG", kubeconfig.display().to_string())
}

/// Check whether a release exists in a namespace
pub async fn release_exists(release: &str, namespace: &str, kubeconfig: &Path) -> Result<bool> {
    let cmd = helm(kubeconfig).args(["status", release, "-n", namespace]);
    let output = run_tool(&cmd).await?;
    if output.success {
        return Ok(true);
    }
    if reports_absent(&output.stderr) {
        return Ok(false);
    }
    Err(CorralError::ToolFailed {
        command: cmd.to_string(),
        detail: output.stderr.trim().to_string(),
    })
}

/// Install a release, or upgrade it in place if it already exists
pub async fn install_or_upgrade(
    release: &str,
    chart: &str,
    namespace: &str,
    values: &[PathBuf],
    kubeconfig: &Path,
) -> Result<()> {
    let mut cmd = helm(kubeconfig).args(["upgrade", "--install", release, chart, "-n", namespace]);
    for file in values {
        cmd = cmd.arg("-f").arg(file.display().to_string());
    }

    info!("installing release '{}' in namespace '{}'", release, namespace);
    run_tool(&cmd).await?.require_success(&cmd)?;
    Ok(())
}

/// Uninstall a release. `Ok(false)` means it was already absent.
pub async fn uninstall(release: &str, namespace: &str, kubeconfig: &Path) -> Result<bool> {
    let cmd = helm(kubeconfig).args(["uninstall", release, "-n", namespace]);
    match run_tool(&cmd).await?.require_success(&cmd) {
        Ok(_) => {
            info!("release '{}' uninstalled from '{}'", release, namespace);
            Ok(true)
        }
        Err(CorralError::ToolFailed { detail, .. }) if reports_absent(&detail) => Ok(false),
        Err(CorralError::ToolFailed { detail, .. }) => Err(CorralError::RemovalFailed {
            resource: format!("release {release}@{namespace}"),
            reason: detail,
        }),
        Err(e) => Err(e),
    }
}

/// Names of releases installed in a namespace
pub async fn list_releases(namespace: &str, kubeconfig: &Path) -> Result<Vec<String>> {
    let cmd = helm(kubeconfig).args(["list", "-n", namespace, "-o", "json"]);
    let stdout = run_tool(&cmd).await?.require_success(&cmd)?;
    parse_release_names(&stdout)
}

fn parse_release_names(json: &str) -> Result<Vec<String>> {
    let releases: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|e| {
        CorralError::PreconditionFailed(format!("unexpected release list output: {e}"))
    })?;

    Ok(releases
        .iter()
        .filter_map(|r| r.get("name").and_then(|n| n.as_str()))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_names() {
        let json = r#"[
            {"name": "flux2", "namespace": "flux-system", "status": "deployed"},
            {"name": "ingress-nginx", "namespace": "ingress-nginx", "status": "deployed"}
        ]"#;
        assert_eq!(
            parse_release_names(json).unwrap(),
            vec!["flux2", "ingress-nginx"]
        );
    }

    #[test]
    fn test_parse_empty_release_list() {
        assert!(parse_release_names("[]").unwrap().is_empty());
    }

    #[test]
    fn test_helm_command_carries_kubeconfig() {
        let cmd = helm(Path::new("/state/kubeconfig.yaml")).args(["list", "-n", "demo"]);
        assert!(cmd
            .envs
            .iter()
            .any(|(k, v)| k == "KUBECONFIG" && v == "/state/kubeconfig.yaml"));
    }
}
