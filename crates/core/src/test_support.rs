// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod fixtures shared by tests across crates.

use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, Pod, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// A running pod with resource version "1".
pub fn pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}-{}", namespace, name)),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(PodStatus { phase: Some("Running".to_string()), ..Default::default() }),
    }
}

pub fn with_phase(mut pod: Pod, phase: &str) -> Pod {
    pod.status.get_or_insert_with(Default::default).phase = Some(phase.to_string());
    pod
}

pub fn with_status_reason(mut pod: Pod, reason: &str) -> Pod {
    pod.status.get_or_insert_with(Default::default).reason = Some(reason.to_string());
    pod
}

pub fn with_resource_version(mut pod: Pod, version: &str) -> Pod {
    pod.metadata.resource_version = Some(version.to_string());
    pod
}

pub fn with_containers(mut pod: Pod, statuses: Vec<ContainerStatus>) -> Pod {
    pod.status.get_or_insert_with(Default::default).container_statuses = Some(statuses);
    pod
}

pub fn with_init_containers(mut pod: Pod, statuses: Vec<ContainerStatus>) -> Pod {
    pod.status.get_or_insert_with(Default::default).init_container_statuses = Some(statuses);
    pod
}

fn container(name: &str, state: ContainerState) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        image: format!("{}:latest", name),
        state: Some(state),
        ..Default::default()
    }
}

pub fn running(name: &str) -> ContainerStatus {
    container(
        name,
        ContainerState { running: Some(ContainerStateRunning::default()), ..Default::default() },
    )
}

pub fn terminated(name: &str, exit_code: i32, reason: &str) -> ContainerStatus {
    container(
        name,
        ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code,
                reason: Some(reason.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
}

pub fn waiting(name: &str, reason: &str) -> ContainerStatus {
    container(
        name,
        ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some(reason.to_string()),
                message: Some(format!("{} for {}", reason, name)),
            }),
            ..Default::default()
        },
    )
}
