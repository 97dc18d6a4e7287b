// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use crate::constants::state;
use crate::error::{CorralError, Result};

/// Resolved options for one orchestration session, supplied by the CLI
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the development cluster
    pub cluster_name: String,
    /// Declarative cluster-runtime config file, if any
    pub cluster_config: Option<PathBuf>,
    /// Path (file or directory) of the application workload manifests
    pub manifest_path: PathBuf,
    /// Extra values files passed to chart installs
    pub values_files: Vec<PathBuf>,
    /// Namespace the application workload lands in
    pub app_namespace: String,
    /// Namespace of the GitOps controller release
    pub gitops_namespace: String,
    /// Namespace of the ingress controller release
    pub ingress_namespace: String,
    pub gitops_chart: String,
    pub gitops_release: String,
    pub ingress_chart: String,
    pub ingress_release: String,
    /// Service to expose on the workstation
    pub service: String,
    /// Port the service listens on inside the cluster
    pub remote_port: u16,
    /// Preferred local port; the allocator probes upwards from here
    pub local_port: u16,
    /// Directory for the registry, kubeconfig, lock and process logs
    pub state_dir: PathBuf,
}

impl Config {
    /// Validate option combinations that clap cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(CorralError::PreconditionFailed(
                "cluster name must not be empty".to_string(),
            ));
        }
        if let Some(path) = &self.cluster_config {
            if !path.exists() {
                return Err(CorralError::PreconditionFailed(format!(
                    "cluster config file {} does not exist",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Namespaces this session manages, in creation order
    pub fn managed_namespaces(&self) -> Vec<&str> {
        let mut namespaces = vec![
            self.gitops_namespace.as_str(),
            self.ingress_namespace.as_str(),
            self.app_namespace.as_str(),
        ];
        namespaces.dedup();
        namespaces
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.state_dir.join(state::KUBECONFIG_FILE)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join(state::REGISTRY_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir
            .join(format!("{}{}", self.cluster_name, state::LOCK_FILE_SUFFIX))
    }

    /// Append-only log file for a supervised process
    pub fn process_log_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{name}.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> Config {
        Config {
            cluster_name: "dev".to_string(),
            cluster_config: None,
            manifest_path: PathBuf::from("deploy/app"),
            values_files: vec![],
            app_namespace: "demo".to_string(),
            gitops_namespace: "flux-system".to_string(),
            ingress_namespace: "ingress-nginx".to_string(),
            gitops_chart: "fluxcd-community/flux2".to_string(),
            gitops_release: "flux2".to_string(),
            ingress_chart: "ingress-nginx/ingress-nginx".to_string(),
            ingress_release: "ingress-nginx".to_string(),
            service: "demo-web".to_string(),
            remote_port: 80,
            local_port: 8080,
            state_dir: PathBuf::from(".corral"),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(make_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_cluster_name() {
        let mut config = make_config();
        config.cluster_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_cluster_config() {
        let mut config = make_config();
        config.cluster_config = Some(PathBuf::from("/definitely/not/here.yaml"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_managed_namespaces_dedups_adjacent() {
        let mut config = make_config();
        config.ingress_namespace = "flux-system".to_string();
        assert_eq!(config.managed_namespaces(), vec!["flux-system", "demo"]);
    }

    #[test]
    fn test_state_paths_live_under_state_dir() {
        let config = make_config();
        assert!(config.registry_path().starts_with(".corral"));
        assert!(config.lock_path().ends_with("dev.lock"));
        assert!(config.process_log_path("forward").ends_with("forward.log"));
    }
}
