// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The concrete provisioning steps a deploy runs, in order: cluster,
//! kubeconfig, namespaces, GitOps controller, ingress controller, workload,
//! port-forward.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::constants::{poll, supervise};
use crate::error::Result;
use crate::kubernetes::workloads::{pod_phase, rollout_ready, service_exists};
use crate::kubernetes::{client_from_kubeconfig_file, namespace_exists};
use crate::pipeline::{Presence, Step};
use crate::poller::{self, Probe};
use crate::ports;
use crate::process::{self, RestartPolicy};
use crate::registry::ResourceKind;
use crate::session::Session;
use crate::tools::{helm, k3d, kubectl};

fn presence(present: bool) -> Presence {
    if present {
        Presence::Present
    } else {
        Presence::Absent
    }
}

/// Name under which the service tunnel is supervised and registered
pub fn forward_name(service: &str) -> String {
    format!("forward-{service}")
}

/// All steps for a deploy, in execution order
pub fn build_steps(session: &Arc<Session>) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(ClusterStep(session.clone())),
        Box::new(KubeconfigStep(session.clone())),
        Box::new(NamespacesStep(session.clone())),
        Box::new(GitopsStep(session.clone())),
        Box::new(IngressStep(session.clone())),
        Box::new(WorkloadStep(session.clone())),
        Box::new(ForwardStep(session.clone())),
    ]
}

struct ClusterStep(Arc<Session>);

#[async_trait]
impl Step for ClusterStep {
    fn name(&self) -> &str {
        "cluster"
    }

    async fn probe(&self) -> Result<Presence> {
        Ok(presence(k3d::cluster_exists(&self.0.config.cluster_name).await?))
    }

    async fn apply(&self) -> Result<()> {
        let config = &self.0.config;
        k3d::create_cluster(&config.cluster_name, config.cluster_config.as_deref()).await?;
        if !self.0.registry.contains(ResourceKind::Cluster, &config.cluster_name) {
            self.0
                .registry
                .record(ResourceKind::Cluster, &config.cluster_name)?;
        }
        Ok(())
    }
}

struct KubeconfigStep(Arc<Session>);

#[async_trait]
impl Step for KubeconfigStep {
    fn name(&self) -> &str {
        "kubeconfig"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["cluster"]
    }

    async fn probe(&self) -> Result<Presence> {
        let path = self.0.config.kubeconfig_path();
        if !path.exists() {
            return Ok(Presence::Absent);
        }
        // A stale or truncated file is rewritten, not an error.
        Ok(presence(client_from_kubeconfig_file(&path).await.is_ok()))
    }

    async fn apply(&self) -> Result<()> {
        let path = self.0.config.kubeconfig_path();
        k3d::write_kubeconfig(&self.0.config.cluster_name, &path).await?;

        let client = client_from_kubeconfig_file(&path).await?;
        let check = self.0.readiness(Some(poll::API_SERVER_TIMEOUT_SECS));
        poller::wait(&check, &self.0.cancel, || {
            let client = client.clone();
            async move {
                if crate::kubernetes::api_server_reachable(&client).await {
                    Probe::Ready
                } else {
                    Probe::Pending
                }
            }
        })
        .await
        .into_result("API server")
    }
}

struct NamespacesStep(Arc<Session>);

#[async_trait]
impl Step for NamespacesStep {
    fn name(&self) -> &str {
        "namespaces"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["kubeconfig"]
    }

    async fn probe(&self) -> Result<Presence> {
        let client = self.0.kube().await?;
        for namespace in self.0.config.managed_namespaces() {
            if !namespace_exists(client, namespace).await? {
                return Ok(Presence::Absent);
            }
        }
        Ok(Presence::Present)
    }

    async fn apply(&self) -> Result<()> {
        let client = self.0.kube().await?;
        let cluster = &self.0.config.cluster_name;
        for namespace in self.0.config.managed_namespaces() {
            if !namespace_exists(client, namespace).await? {
                crate::kubernetes::ensure_namespace_exists(client, namespace, cluster).await?;
                if !self.0.registry.contains(ResourceKind::Namespace, namespace) {
                    self.0.registry.record(ResourceKind::Namespace, namespace)?;
                }
            }
        }
        Ok(())
    }
}

struct GitopsStep(Arc<Session>);

#[async_trait]
impl Step for GitopsStep {
    fn name(&self) -> &str {
        "gitops"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["kubeconfig", "namespaces"]
    }

    async fn probe(&self) -> Result<Presence> {
        let config = &self.0.config;
        Ok(presence(
            helm::release_exists(
                &config.gitops_release,
                &config.gitops_namespace,
                &config.kubeconfig_path(),
            )
            .await?,
        ))
    }

    async fn apply(&self) -> Result<()> {
        let config = &self.0.config;
        helm::install_or_upgrade(
            &config.gitops_release,
            &config.gitops_chart,
            &config.gitops_namespace,
            &config.values_files,
            &config.kubeconfig_path(),
        )
        .await?;

        let id = format!("{}@{}", config.gitops_release, config.gitops_namespace);
        if !self.0.registry.contains(ResourceKind::Release, &id) {
            self.0.registry.record(ResourceKind::Release, id)?;
        }

        // The controller pods are the readiness signal; the chart itself
        // returns before they are scheduled.
        let client = self.0.kube().await?;
        let check = self.0.readiness(Some(poll::ROLLOUT_TIMEOUT_SECS));
        let namespace = config.gitops_namespace.clone();
        poller::wait(&check, &self.0.cancel, || {
            let client = client.clone();
            let namespace = namespace.clone();
            async move {
                match pod_phase(&client, &namespace, "").await {
                    Ok(Some(phase)) if phase == "Running" => Probe::Ready,
                    Ok(_) => Probe::Pending,
                    Err(e) => Probe::Failed(e.to_string()),
                }
            }
        })
        .await
        .into_result("GitOps controller pods")
    }
}

struct IngressStep(Arc<Session>);

#[async_trait]
impl Step for IngressStep {
    fn name(&self) -> &str {
        "ingress"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["kubeconfig", "namespaces"]
    }

    async fn probe(&self) -> Result<Presence> {
        let config = &self.0.config;
        Ok(presence(
            helm::release_exists(
                &config.ingress_release,
                &config.ingress_namespace,
                &config.kubeconfig_path(),
            )
            .await?,
        ))
    }

    async fn apply(&self) -> Result<()> {
        let config = &self.0.config;
        helm::install_or_upgrade(
            &config.ingress_release,
            &config.ingress_chart,
            &config.ingress_namespace,
            &config.values_files,
            &config.kubeconfig_path(),
        )
        .await?;

        let id = format!("{}@{}", config.ingress_release, config.ingress_namespace);
        if !self.0.registry.contains(ResourceKind::Release, &id) {
            self.0.registry.record(ResourceKind::Release, id)?;
        }

        let client = self.0.kube().await?;
        let check = self.0.readiness(Some(poll::ROLLOUT_TIMEOUT_SECS));
        let deployment = format!("{}-controller", config.ingress_release);
        let namespace = config.ingress_namespace.clone();
        poller::wait(&check, &self.0.cancel, || {
            let client = client.clone();
            let deployment = deployment.clone();
            let namespace = namespace.clone();
            async move {
                match rollout_ready(&client, &deployment, &namespace).await {
                    Ok(true) => Probe::Ready,
                    Ok(false) => Probe::Pending,
                    Err(e) => Probe::Failed(e.to_string()),
                }
            }
        })
        .await
        .into_result("ingress controller rollout")
    }
}

struct WorkloadStep(Arc<Session>);

#[async_trait]
impl Step for WorkloadStep {
    fn name(&self) -> &str {
        "workload"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["namespaces", "ingress"]
    }

    async fn probe(&self) -> Result<Presence> {
        let client = self.0.kube().await?;
        let config = &self.0.config;
        Ok(presence(
            service_exists(client, &config.service, &config.app_namespace).await?,
        ))
    }

    async fn apply(&self) -> Result<()> {
        let config = &self.0.config;
        kubectl::apply_manifests(
            &config.manifest_path,
            &config.app_namespace,
            &config.kubeconfig_path(),
        )
        .await?;

        // The manifests name the ingress after the service.
        let id = format!("{}@{}", config.service, config.app_namespace);
        if !self.0.registry.contains(ResourceKind::IngressObject, &id) {
            self.0.registry.record(ResourceKind::IngressObject, id)?;
        }

        let client = self.0.kube().await?;
        let check = self.0.readiness(Some(poll::ROLLOUT_TIMEOUT_SECS));
        let deployment = config.service.clone();
        let namespace = config.app_namespace.clone();
        poller::wait(&check, &self.0.cancel, || {
            let client = client.clone();
            let deployment = deployment.clone();
            let namespace = namespace.clone();
            async move {
                match rollout_ready(&client, &deployment, &namespace).await {
                    Ok(true) => Probe::Ready,
                    Ok(false) => Probe::Pending,
                    Err(e) => Probe::Failed(e.to_string()),
                }
            }
        })
        .await
        .into_result("workload rollout")
    }
}

struct ForwardStep(Arc<Session>);

#[async_trait]
impl Step for ForwardStep {
    fn name(&self) -> &str {
        "forward"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["workload"]
    }

    async fn probe(&self) -> Result<Presence> {
        let name = forward_name(&self.0.config.service);
        Ok(presence(self.0.has_forward(&name).await))
    }

    async fn apply(&self) -> Result<()> {
        let config = &self.0.config;
        let name = forward_name(&config.service);
        let local_port = ports::allocate(config.local_port)?;

        let command = kubectl::port_forward_command(
            &config.service,
            &config.app_namespace,
            local_port,
            config.remote_port,
            &config.kubeconfig_path(),
        );

        let handle = process::start(
            &name,
            command,
            RestartPolicy::Always {
                cooldown: Duration::from_secs(supervise::RESTART_COOLDOWN_SECS),
            },
            config.process_log_path(&name),
            &self.0.cancel,
        )
        .await?;

        self.0.adopt_forward(handle).await;
        if !self.0.registry.contains(ResourceKind::LocalProcess, &name) {
            self.0.registry.record(ResourceKind::LocalProcess, &name)?;
        }

        tracing::info!(
            "service '{}' forwarded to http://127.0.0.1:{}",
            config.service,
            local_port
        );
        Ok(())
    }
}
