// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes labels stamped on every object Corral creates
pub mod labels {
    /// Marks an object as managed by this tool; teardown discovery keys on it
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    /// Value for [`MANAGED_BY`]
    pub const MANAGER: &str = "corral";
    /// Carries the cluster name the object belongs to
    pub const SESSION: &str = "corral.dev/session";
}

/// Readiness polling configuration
pub mod poll {
    /// Delay between readiness probes in seconds
    pub const INTERVAL_SECS: u64 = 5;
    /// Upper bound on waiting for the API server after cluster creation
    pub const API_SERVER_TIMEOUT_SECS: u64 = 120;
    /// Upper bound on waiting for a deployment rollout
    pub const ROLLOUT_TIMEOUT_SECS: u64 = 300;
}

/// Process supervision configuration
pub mod supervise {
    /// Cool-down between crash-restarts of a supervised process, in seconds
    pub const RESTART_COOLDOWN_SECS: u64 = 2;
}

/// File names inside the per-cluster state directory
pub mod state {
    pub const REGISTRY_FILE: &str = "resources.json";
    pub const KUBECONFIG_FILE: &str = "kubeconfig.yaml";
    pub const LOCK_FILE_SUFFIX: &str = ".lock";
}

/// Prefix of the container-level artifacts the cluster runtime creates for a
/// named cluster (containers, volumes, the cluster network).
pub fn container_prefix(cluster: &str) -> String {
    format!("k3d-{cluster}")
}
