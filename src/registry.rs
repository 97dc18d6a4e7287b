// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Session-scoped record of every resource the pipeline created.
//!
//! The registry is advisory: it is persisted to the state directory so a
//! later teardown can consume it, but a missing or unreadable file is never
//! an error (teardown then falls back to discovery-by-listing).

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Category of a managed resource; drives teardown grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    LocalProcess,
    IngressObject,
    Release,
    Namespace,
    Container,
    ContainerImage,
    ContainerVolume,
    ContainerNetwork,
    Cluster,
}

/// One resource the pipeline created, addressable by its collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub kind: ResourceKind,
    /// Opaque handle understood by the owning collaborator
    pub id: String,
    /// Position assigned at provisioning time; teardown walks each kind in
    /// strictly reverse order of this
    pub creation_order: u64,
}

impl ManagedResource {
    /// Identifier with namespace context, e.g. `flux2@flux-system`.
    pub fn namespaced(kind: ResourceKind, name: &str, namespace: &str) -> (ResourceKind, String) {
        (kind, format!("{name}@{namespace}"))
    }

    /// Split a namespaced id back into (name, namespace).
    pub fn split_namespaced(&self) -> (&str, &str) {
        match self.id.split_once('@') {
            Some((name, namespace)) => (name, namespace),
            None => (self.id.as_str(), ""),
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Inner {
    resources: Vec<ManagedResource>,
    next_order: u64,
}

pub struct Registry {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl Registry {
    /// Registry without a backing file; used by tests and discovery mode.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Load the registry file if present; anything else starts empty.
    pub fn load_or_default(path: PathBuf) -> Self {
        let inner = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Inner>(&bytes) {
                Ok(inner) => {
                    debug!(
                        "loaded registry with {} resources from {}",
                        inner.resources.len(),
                        path.display()
                    );
                    inner
                }
                Err(e) => {
                    warn!(
                        "registry file {} is unreadable ({}), starting empty",
                        path.display(),
                        e
                    );
                    Inner::default()
                }
            },
            Err(_) => Inner::default(),
        };

        Self {
            path: Some(path),
            inner: Mutex::new(inner),
        }
    }

    /// Append a resource and persist before returning, so a crash right after
    /// creation still leaves an accurate cleanup record.
    pub fn record(&self, kind: ResourceKind, id: impl Into<String>) -> Result<ManagedResource> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let resource = ManagedResource {
            kind,
            id: id.into(),
            creation_order: inner.next_order,
        };
        inner.next_order += 1;
        inner.resources.push(resource.clone());
        self.persist(&inner)?;
        Ok(resource)
    }

    /// Drop a resource that has been removed externally, and persist.
    pub fn forget(&self, resource: &ManagedResource) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner
            .resources
            .retain(|r| !(r.kind == resource.kind && r.id == resource.id));
        self.persist(&inner)
    }

    pub fn snapshot(&self) -> Vec<ManagedResource> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .resources
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .resources
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if a resource of this kind and id is already recorded.
    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .resources
            .iter()
            .any(|r| r.kind == kind && r.id == id)
    }

    fn persist(&self, inner: &Inner) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(inner).map_err(|e| {
            crate::error::CorralError::PreconditionFailed(format!(
                "cannot serialize registry: {e}"
            ))
        })?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
