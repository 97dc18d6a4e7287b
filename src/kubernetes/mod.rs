// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes API access: session client creation, namespace management and
//! workload readiness probes.

pub mod client;
pub mod namespaces;
pub mod workloads;

pub use client::{api_server_reachable, client_from_kubeconfig_file};
pub use namespaces::{delete_namespace, ensure_namespace_exists, namespace_exists};
