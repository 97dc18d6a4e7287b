// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Session cluster client creation from the kubeconfig the cluster runtime emits

use std::path::Path;

use kube::{config::KubeConfigOptions, Client};
use tracing::debug;

use crate::error::{CorralError, Result};

/// Create a Kubernetes client from a kubeconfig file in the state directory
pub async fn client_from_kubeconfig_file(path: &Path) -> Result<Client> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CorralError::KubeconfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    client_from_kubeconfig(&contents).await
}

/// Create a Kubernetes client from a kubeconfig string
pub async fn client_from_kubeconfig(kubeconfig: &str) -> Result<Client> {
    use kube::config::Kubeconfig;

    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| CorralError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                CorralError::KubeconfigError(format!("Failed to create config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| CorralError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Check whether the API server behind the client answers a version request.
/// Used as the readiness probe right after cluster creation.
pub async fn api_server_reachable(client: &Client) -> bool {
    match client.apiserver_version().await {
        Ok(version) => {
            debug!("API server is up (version {})", version.git_version);
            true
        }
        Err(e) => {
            debug!("API server not reachable yet: {}", e);
            false
        }
    }
}
