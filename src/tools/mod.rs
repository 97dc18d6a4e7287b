// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wrappers around the external command-line collaborators: the cluster
//! runtime, the chart installer, the manifest applier and the container
//! runtime. Wire formats are theirs; only exit status and parsed listings
//! cross this boundary.

pub mod docker;
pub mod helm;
pub mod k3d;
pub mod kubectl;

/// True when a failed removal actually means the target was already gone.
/// The collaborators phrase this differently, so match loosely.
pub(crate) fn reports_absent(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    detail.contains("not found")
        || detail.contains("no such")
        || detail.contains("no clusters")
        || detail.contains("no nodes found")
}
