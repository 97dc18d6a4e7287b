// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! One orchestration session: resolved config, resource registry, cancellation
//! and lazily-built cluster access, passed explicitly to every operation.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use kube::Client;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::poll;
use crate::error::{CorralError, Result};
use crate::kubernetes::client_from_kubeconfig_file;
use crate::poller::ReadinessCheck;
use crate::process::SupervisedHandle;
use crate::registry::Registry;

/// Exclusive per-cluster lock; serializes runs against the same cluster name.
struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CorralError::PreconditionFailed(format!(
                    "another run holds {}; remove the file if it is stale",
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("could not remove lock file {}: {}", self.path.display(), e);
        }
    }
}

pub struct Session {
    pub config: Config,
    pub registry: Registry,
    pub cancel: CancellationToken,
    kube: OnceCell<Client>,
    forwards: tokio::sync::Mutex<Vec<SupervisedHandle>>,
    _lock: SessionLock,
}

impl Session {
    /// Open a session: validate config, create the state directory, take the
    /// cluster lock and load the advisory registry.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.state_dir)?;

        let lock = SessionLock::acquire(config.lock_path())?;
        let registry = Registry::load_or_default(config.registry_path());

        Ok(Self {
            registry,
            cancel: CancellationToken::new(),
            kube: OnceCell::new(),
            forwards: tokio::sync::Mutex::new(Vec::new()),
            _lock: lock,
            config,
        })
    }

    /// Client for the session cluster, built once from the state-dir
    /// kubeconfig. Fails until the kubeconfig step has written that file.
    pub async fn kube(&self) -> Result<&Client> {
        let path = self.config.kubeconfig_path();
        self.kube
            .get_or_try_init(|| client_from_kubeconfig_file(&path))
            .await
    }

    /// Default readiness gate cadence for this session
    pub fn readiness(&self, timeout_secs: Option<u64>) -> ReadinessCheck {
        ReadinessCheck::new(
            Duration::from_secs(poll::INTERVAL_SECS),
            timeout_secs.map(Duration::from_secs),
        )
    }

    /// Track a supervised forward so cancellation and teardown reach it
    pub async fn adopt_forward(&self, handle: SupervisedHandle) {
        self.forwards.lock().await.push(handle);
    }

    /// Stop every supervised forward this session started
    pub async fn stop_forwards(&self) {
        let forwards = {
            let mut guard = self.forwards.lock().await;
            std::mem::take(&mut *guard)
        };
        for handle in &forwards {
            info!("stopping '{}'", handle.name());
            handle.stop().await;
        }
    }

    /// Stop a single forward by registry id, if this session owns it.
    /// `Ok(false)` means no such forward was running here.
    pub async fn stop_forward(&self, name: &str) -> bool {
        let handle = {
            let mut guard = self.forwards.lock().await;
            let index = guard.iter().position(|h| h.name() == name);
            index.map(|i| guard.remove(i))
        };
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    /// True when a forward with this name is currently supervised here
    pub async fn has_forward(&self, name: &str) -> bool {
        self.forwards.lock().await.iter().any(|h| h.name() == name)
    }
}
