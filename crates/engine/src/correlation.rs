// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod ⇄ agent correlation.
//!
//! Always a scan over the live registry: the registry is the only copy of
//! the agent list, so a lookup can never disagree with it.

use reaper_adapters::AgentRegistry;
use reaper_core::{AgentRecord, PodRef};

/// The agent whose pod is `namespace/name`, if any.
pub fn find_agent_for_pod(
    registry: &dyn AgentRegistry,
    namespace: &str,
    name: &str,
) -> Option<AgentRecord> {
    registry.all_agents().into_iter().find(|agent| agent.pod.matches(namespace, name))
}

/// Like [`find_agent_for_pod`], restricted to agents of one cloud.
pub fn find_cloud_agent_for_pod(
    registry: &dyn AgentRegistry,
    cloud: &str,
    pod: &PodRef,
) -> Option<AgentRecord> {
    find_agent_for_pod(registry, &pod.namespace, &pod.name).filter(|agent| agent.cloud == cloud)
}

pub fn find_pod_ref_for_agent(agent: &AgentRecord) -> &PodRef {
    &agent.pod
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;
