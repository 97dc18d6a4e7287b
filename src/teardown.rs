// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Best-effort, dependency-ordered teardown of everything the pipeline made.
//!
//! Kind groups run in a fixed sequence; within a group, resources go in
//! reverse creation order. A failed removal is recorded and never stops the
//! run. Destroying the cluster itself is gated behind an explicit flag and is
//! the one failure that drives a non-zero exit.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::container_prefix;
use crate::error::Result;
use crate::kubernetes::workloads::delete_ingress;
use crate::kubernetes::{delete_namespace, namespaces::list_managed_namespaces};
use crate::registry::{ManagedResource, ResourceKind};
use crate::session::Session;
use crate::tools::{docker, helm, k3d};

/// Teardown processes kinds in this exact sequence: application-layer
/// objects, releases, namespaces, container-level leftovers, the cluster.
pub const KIND_ORDER: [ResourceKind; 9] = [
    ResourceKind::LocalProcess,
    ResourceKind::IngressObject,
    ResourceKind::Release,
    ResourceKind::Namespace,
    ResourceKind::Container,
    ResourceKind::ContainerImage,
    ResourceKind::ContainerVolume,
    ResourceKind::ContainerNetwork,
    ResourceKind::Cluster,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug)]
pub struct RemovalRecord {
    pub resource: ManagedResource,
    pub outcome: RemovalOutcome,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub records: Vec<RemovalRecord>,
    /// True when the input came from discovery instead of the registry
    pub discovered: bool,
    /// Set when a requested cluster destroy failed; the only fatal outcome
    pub cluster_destroy_failed: bool,
}

impl TeardownReport {
    pub fn removed(&self) -> usize {
        self.count(|o| *o == RemovalOutcome::Removed)
    }

    pub fn already_absent(&self) -> usize {
        self.count(|o| *o == RemovalOutcome::AlreadyAbsent)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RemovalOutcome::Failed(_)))
    }

    fn count(&self, f: impl Fn(&RemovalOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} removed, {} already absent, {} failed",
            self.removed(),
            self.already_absent(),
            self.failed()
        )
    }
}

/// Removal dispatch for a single resource. The engine is written against this
/// seam so the ordering and aggregation contract is testable without the
/// external collaborators.
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, resource: &ManagedResource) -> RemovalOutcome;
}

/// Walk `resources` in teardown order, attempting every removal.
pub async fn teardown_resources(
    resources: &[ManagedResource],
    remover: &dyn Remover,
    destroy_cluster: bool,
) -> TeardownReport {
    let mut report = TeardownReport::default();

    for kind in KIND_ORDER {
        if kind == ResourceKind::Cluster && !destroy_cluster {
            if resources.iter().any(|r| r.kind == kind) {
                info!("cluster left in place; pass --destroy-cluster to remove it");
            }
            continue;
        }

        let mut group: Vec<&ManagedResource> =
            resources.iter().filter(|r| r.kind == kind).collect();
        group.sort_by(|a, b| b.creation_order.cmp(&a.creation_order));

        for resource in group {
            let outcome = remover.remove(resource).await;
            match &outcome {
                RemovalOutcome::Removed => info!("removed {} '{}'", kind_label(kind), resource.id),
                RemovalOutcome::AlreadyAbsent => {
                    info!("{} '{}' already absent", kind_label(kind), resource.id)
                }
                RemovalOutcome::Failed(reason) => {
                    warn!("failed to remove {} '{}': {}", kind_label(kind), resource.id, reason);
                    if kind == ResourceKind::Cluster {
                        report.cluster_destroy_failed = true;
                    }
                }
            }
            report.records.push(RemovalRecord {
                resource: resource.clone(),
                outcome,
            });
        }
    }

    report
}

fn kind_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::LocalProcess => "local process",
        ResourceKind::IngressObject => "ingress",
        ResourceKind::Release => "release",
        ResourceKind::Namespace => "namespace",
        ResourceKind::Container => "container",
        ResourceKind::ContainerImage => "image",
        ResourceKind::ContainerVolume => "volume",
        ResourceKind::ContainerNetwork => "network",
        ResourceKind::Cluster => "cluster",
    }
}

/// Production remover: dispatches each kind to its owning collaborator.
struct SessionRemover<'a> {
    session: &'a Session,
    /// When the cluster is already gone, everything that lived inside it is
    /// treated as absent rather than producing connection errors per item.
    cluster_alive: bool,
}

impl SessionRemover<'_> {
    fn outcome(result: Result<bool>) -> RemovalOutcome {
        match result {
            Ok(true) => RemovalOutcome::Removed,
            Ok(false) => RemovalOutcome::AlreadyAbsent,
            Err(e) => RemovalOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl Remover for SessionRemover<'_> {
    async fn remove(&self, resource: &ManagedResource) -> RemovalOutcome {
        let in_cluster = matches!(
            resource.kind,
            ResourceKind::IngressObject | ResourceKind::Release | ResourceKind::Namespace
        );
        if in_cluster && !self.cluster_alive {
            return RemovalOutcome::AlreadyAbsent;
        }

        let kubeconfig = self.session.config.kubeconfig_path();

        match resource.kind {
            ResourceKind::LocalProcess => {
                Self::outcome(Ok(self.session.stop_forward(&resource.id).await))
            }
            ResourceKind::IngressObject => {
                let (name, namespace) = resource.split_namespaced();
                match self.session.kube().await {
                    Ok(client) => Self::outcome(delete_ingress(client, name, namespace).await),
                    Err(e) => RemovalOutcome::Failed(e.to_string()),
                }
            }
            ResourceKind::Release => {
                let (name, namespace) = resource.split_namespaced();
                Self::outcome(helm::uninstall(name, namespace, &kubeconfig).await)
            }
            ResourceKind::Namespace => match self.session.kube().await {
                Ok(client) => Self::outcome(delete_namespace(client, &resource.id).await),
                Err(e) => RemovalOutcome::Failed(e.to_string()),
            },
            ResourceKind::Container => Self::outcome(docker::remove_container(&resource.id).await),
            ResourceKind::ContainerImage => Self::outcome(docker::remove_image(&resource.id).await),
            ResourceKind::ContainerVolume => {
                Self::outcome(docker::remove_volume(&resource.id).await)
            }
            ResourceKind::ContainerNetwork => {
                Self::outcome(docker::remove_network(&resource.id).await)
            }
            ResourceKind::Cluster => Self::outcome(k3d::delete_cluster(&resource.id).await),
        }
    }
}

/// Run a full teardown for the session.
pub async fn run(session: &Session, destroy_cluster: bool) -> TeardownReport {
    let mut resources = session.registry.snapshot();
    let mut discovered = false;

    if resources.is_empty() {
        warn!("resource registry is empty or unavailable; discovering by listing");
        resources = discover(session).await;
        discovered = true;
    }

    let cluster_alive = k3d::cluster_exists(&session.config.cluster_name)
        .await
        .unwrap_or(false);

    if destroy_cluster {
        augment_for_destroy(session, &mut resources, cluster_alive).await;
    }

    let remover = SessionRemover {
        session,
        cluster_alive,
    };
    let mut report = teardown_resources(&resources, &remover, destroy_cluster).await;
    report.discovered = discovered;

    for record in &report.records {
        if !matches!(record.outcome, RemovalOutcome::Failed(_)) {
            if let Err(e) = session.registry.forget(&record.resource) {
                warn!("could not update registry: {}", e);
            }
        }
    }

    report
}

/// Best-effort listing of managed resources when the registry is gone.
/// Lower precision than the registry: it leans on the naming convention and
/// the managed-by label established at provisioning time.
async fn discover(session: &Session) -> Vec<ManagedResource> {
    let config = &session.config;
    let mut resources = Vec::new();
    let mut order = 0u64;
    let mut push = |kind: ResourceKind, id: String, resources: &mut Vec<ManagedResource>| {
        resources.push(ManagedResource {
            kind,
            id,
            creation_order: order,
        });
        order += 1;
    };

    match k3d::list_clusters().await {
        Ok(clusters) => {
            if clusters.iter().any(|c| c == &config.cluster_name) {
                push(
                    ResourceKind::Cluster,
                    config.cluster_name.clone(),
                    &mut resources,
                );
            }
        }
        Err(e) => warn!("cluster discovery failed: {}", e),
    }

    let cluster_listed = resources
        .iter()
        .any(|r| r.kind == ResourceKind::Cluster);

    if cluster_listed {
        if let Ok(client) = session.kube().await {
            match list_managed_namespaces(client, &config.cluster_name).await {
                Ok(namespaces) => {
                    for namespace in namespaces {
                        push(ResourceKind::Namespace, namespace, &mut resources);
                    }
                }
                Err(e) => warn!("namespace discovery failed: {}", e),
            }
        }

        for namespace in config.managed_namespaces() {
            match helm::list_releases(namespace, &config.kubeconfig_path()).await {
                Ok(releases) => {
                    for release in releases {
                        push(
                            ResourceKind::Release,
                            format!("{release}@{namespace}"),
                            &mut resources,
                        );
                    }
                }
                Err(e) => warn!("release discovery in '{}' failed: {}", namespace, e),
            }
        }

        // The manifests name the ingress after the service.
        push(
            ResourceKind::IngressObject,
            format!("{}@{}", config.service, config.app_namespace),
            &mut resources,
        );
    }

    resources
}

/// A destroy also reclaims the container-level substrate the cluster runtime
/// leaves behind, listed by the naming convention.
async fn augment_for_destroy(
    session: &Session,
    resources: &mut Vec<ManagedResource>,
    cluster_alive: bool,
) {
    let config = &session.config;
    let prefix = container_prefix(&config.cluster_name);
    let mut order = resources
        .iter()
        .map(|r| r.creation_order + 1)
        .max()
        .unwrap_or(0);

    let listings = [
        (ResourceKind::Container, docker::list_containers(&prefix).await),
        (ResourceKind::ContainerImage, docker::list_images(&prefix).await),
        (ResourceKind::ContainerVolume, docker::list_volumes(&prefix).await),
        (ResourceKind::ContainerNetwork, docker::list_networks(&prefix).await),
    ];

    for (kind, listing) in listings {
        match listing {
            Ok(ids) => {
                for id in ids {
                    if !resources.iter().any(|r| r.kind == kind && r.id == id) {
                        resources.push(ManagedResource {
                            kind,
                            id,
                            creation_order: order,
                        });
                        order += 1;
                    }
                }
            }
            Err(e) => warn!("container listing failed: {}", e),
        }
    }

    if cluster_alive
        && !resources
            .iter()
            .any(|r| r.kind == ResourceKind::Cluster && r.id == config.cluster_name)
    {
        resources.push(ManagedResource {
            kind: ResourceKind::Cluster,
            id: config.cluster_name.clone(),
            creation_order: order,
        });
    }
}
