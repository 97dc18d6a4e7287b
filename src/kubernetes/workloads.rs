// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload existence and readiness probes

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{DeleteParams, ListParams},
    Api, Client,
};
use tracing::{debug, info};

use crate::error::Result;

/// Check whether a service exists in a namespace
pub async fn service_exists(client: &Client, name: &str, namespace: &str) -> Result<bool> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);

    match services.get(name).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Phase of the first pod matching the label selector, if any
pub async fn pod_phase(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Option<String>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(selector)
    };
    let list = pods.list(&params).await?;

    Ok(list
        .items
        .into_iter()
        .next()
        .and_then(|pod| pod.status)
        .and_then(|status| status.phase))
}

/// Check whether a deployment's rollout has completed: every desired replica
/// is ready. A deployment that does not exist yet reads as not rolled out.
pub async fn rollout_ready(client: &Client, deployment: &str, namespace: &str) -> Result<bool> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    let deployment = match deployments.get(deployment).await {
        Ok(d) => d,
        Err(kube::Error::Api(err)) if err.code == 404 => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);

    debug!("rollout {}/{} replicas ready", ready, desired);
    Ok(ready >= desired)
}

/// Delete an ingress object. `Ok(false)` means it was already absent.
pub async fn delete_ingress(client: &Client, name: &str, namespace: &str) -> Result<bool> {
    let ingresses: Api<Ingress> = Api::namespaced(client.clone(), namespace);

    match ingresses.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Ingress {}/{} deletion requested", namespace, name);
            Ok(true)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}
