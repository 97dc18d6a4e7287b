// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorralError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Step '{step}' failed to apply: {reason}")]
    ApplyFailed { step: String, reason: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Failed to launch '{command}': {reason}")]
    LaunchFailed { command: String, reason: String },

    #[error("No free local port in the valid range")]
    NoPortAvailable,

    #[error("Failed to remove {resource}: {reason}")]
    RemovalFailed { resource: String, reason: String },

    #[error("'{command}' exited unsuccessfully: {detail}")]
    ToolFailed { command: String, detail: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CorralError>;
