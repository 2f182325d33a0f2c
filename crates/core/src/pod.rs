// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accessors over the native Kubernetes `Pod` snapshot.
//!
//! Every field of interest on a pod is optional in the API schema; these
//! helpers flatten the option chains so policies read as plain predicates.

use crate::agent::PodRef;
use k8s_openapi::api::core::v1::{
    ContainerStateTerminated, ContainerStateWaiting, ContainerStatus, Pod,
};

pub const PHASE_FAILED: &str = "Failed";
pub const PHASE_UNKNOWN: &str = "Unknown";

/// Namespace and name of a pod, if the snapshot carries both.
pub fn pod_ref(pod: &Pod) -> Option<PodRef> {
    let name = pod.metadata.name.as_deref()?;
    let namespace = pod.metadata.namespace.as_deref()?;
    Some(PodRef::new(namespace, name))
}

pub fn phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref()?.phase.as_deref()
}

/// Machine-readable reason on the pod status (e.g. `Evicted`).
pub fn status_reason(pod: &Pod) -> Option<&str> {
    pod.status.as_ref()?.reason.as_deref()
}

pub fn resource_version(pod: &Pod) -> Option<&str> {
    pod.metadata.resource_version.as_deref()
}

/// Statuses of the regular (non-init) containers.
pub fn container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status.as_ref().and_then(|s| s.container_statuses.as_deref()).unwrap_or(&[])
}

pub fn init_container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status.as_ref().and_then(|s| s.init_container_statuses.as_deref()).unwrap_or(&[])
}

pub fn terminated(status: &ContainerStatus) -> Option<&ContainerStateTerminated> {
    status.state.as_ref()?.terminated.as_ref()
}

pub fn waiting(status: &ContainerStatus) -> Option<&ContainerStateWaiting> {
    status.state.as_ref()?.waiting.as_ref()
}

/// True when the pod failed or any container exited non-zero.
pub fn has_failed(pod: &Pod) -> bool {
    matches!(phase(pod), Some(PHASE_FAILED) | Some(PHASE_UNKNOWN))
        || container_statuses(pod)
            .iter()
            .filter_map(terminated)
            .any(|t| t.exit_code != 0)
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
