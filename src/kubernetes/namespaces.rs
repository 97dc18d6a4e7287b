// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, PostParams},
    Api, Client,
};
use tracing::{debug, info};

use crate::constants::labels;
use crate::error::{CorralError, Result};

/// Check whether a namespace exists
pub async fn namespace_exists(client: &Client, namespace: &str) -> Result<bool> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.get(namespace).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Ensure a namespace exists in the cluster, create if it doesn't.
/// Created namespaces are labelled so teardown discovery can find them.
pub async fn ensure_namespace_exists(client: &Client, namespace: &str, cluster: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.get(namespace).await {
        Ok(_) => {
            debug!("Namespace {} already exists", namespace);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Creating namespace {}", namespace);
            let mut namespace_labels = BTreeMap::new();
            namespace_labels.insert(labels::MANAGED_BY.to_string(), labels::MANAGER.to_string());
            namespace_labels.insert(labels::SESSION.to_string(), cluster.to_string());

            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(namespace.to_string()),
                    labels: Some(namespace_labels),
                    ..Default::default()
                },
                ..Default::default()
            };
            namespaces.create(&PostParams::default(), &ns).await?;
            info!("Namespace {} created successfully", namespace);
            Ok(())
        }
        Err(e) => Err(CorralError::PreconditionFailed(format!(
            "Failed to check/create namespace {}: {}",
            namespace, e
        ))),
    }
}

/// Delete a namespace. `Ok(false)` means it was already absent.
pub async fn delete_namespace(client: &Client, namespace: &str) -> Result<bool> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(namespace, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Namespace {} deletion requested", namespace);
            Ok(true)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// List namespaces carrying this tool's labels for the given cluster name.
/// Teardown discovery input when the registry is unavailable.
pub async fn list_managed_namespaces(client: &Client, cluster: &str) -> Result<Vec<String>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let selector = format!(
        "{}={},{}={}",
        labels::MANAGED_BY,
        labels::MANAGER,
        labels::SESSION,
        cluster
    );
    let list = namespaces
        .list(&ListParams::default().labels(&selector))
        .await?;

    Ok(list
        .items
        .into_iter()
        .filter_map(|ns| ns.metadata.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, namespace_list_json, not_found_json, MockService};

    #[tokio::test]
    async fn test_namespace_exists_true() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/demo", 200, &namespace_json("demo"))
            .into_client();

        assert!(namespace_exists(&client, "demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_exists_false_on_404() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/demo",
                404,
                &not_found_json("namespaces", "demo"),
            )
            .into_client();

        assert!(!namespace_exists(&client, "demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_skips_existing_namespace() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/demo", 200, &namespace_json("demo"))
            .into_client();

        assert!(ensure_namespace_exists(&client, "demo", "dev").await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_namespace() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/demo",
                404,
                &not_found_json("namespaces", "demo"),
            )
            .on_post("/api/v1/namespaces", 201, &namespace_json("demo"))
            .into_client();

        assert!(ensure_namespace_exists(&client, "demo", "dev").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_absent_namespace_reports_false() {
        let client = MockService::new()
            .on_delete(
                "/api/v1/namespaces/demo",
                404,
                &not_found_json("namespaces", "demo"),
            )
            .into_client();

        assert!(!delete_namespace(&client, "demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_existing_namespace_reports_true() {
        let client = MockService::new()
            .on_delete("/api/v1/namespaces/demo", 200, &namespace_json("demo"))
            .into_client();

        assert!(delete_namespace(&client, "demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_managed_namespaces_extracts_names() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces",
                200,
                &namespace_list_json(&["flux-system", "demo"]),
            )
            .into_client();

        let names = list_managed_namespaces(&client, "dev").await.unwrap();
        assert_eq!(names, vec!["flux-system", "demo"]);
    }
}
