// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation pass run once, when the reaper activates.
//!
//! Pods deleted while nothing was watching never produce a `Deleted` event.
//! Every agent is checked against its cluster; agents whose pod is gone are
//! removed. Agents whose cluster cannot be asked are left alone.

use crate::clouds::CloudStore;
use reaper_adapters::{AgentRegistry, ClusterClient, ClusterConnector};
use reaper_core::OfflineCause;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReconcileSummary {
    pub checked: usize,
    pub removed: usize,
    pub failed: usize,
}

pub(crate) async fn reconcile_agents(
    registry: &dyn AgentRegistry,
    connector: &dyn ClusterConnector,
    store: &CloudStore,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    // One connection per cloud; `None` marks a cloud that could not be reached
    let mut clients: HashMap<String, Option<Arc<dyn ClusterClient>>> = HashMap::new();

    for agent in registry.all_agents() {
        let Some(cloud) = store.get(&agent.cloud) else {
            debug!(agent = %agent.name, cloud = %agent.cloud, "agent cloud not configured, skipping");
            continue;
        };
        if !clients.contains_key(cloud.name()) {
            let client = match connector.connect(&cloud).await {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(cloud = %cloud, error = %e, "cannot reconcile agents of cloud");
                    None
                }
            };
            clients.insert(cloud.name().to_string(), client);
        }
        let Some(client) = clients.get(cloud.name()).and_then(Option::as_ref) else {
            summary.failed += 1;
            continue;
        };

        summary.checked += 1;
        match client.get_pod(&agent.pod.namespace, &agent.pod.name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(agent = %agent.name, pod = %agent.pod, "pod no longer exists, removing agent");
                let cause = OfflineCause::PodDeleted { pod: agent.pod.clone() };
                if let Err(e) = registry.disconnect(&agent.name, cause) {
                    warn!(agent = %agent.name, error = %e, "failed to disconnect agent");
                }
                registry.remove_agent(&agent.name);
                summary.removed += 1;
            }
            Err(e) => {
                warn!(agent = %agent.name, pod = %agent.pod, error = %e, "cannot check pod, keeping agent");
                summary.failed += 1;
            }
        }
    }

    info!(
        checked = summary.checked,
        removed = summary.removed,
        failed = summary.failed,
        "reconciled agents with their pods"
    );
    summary
}

#[cfg(test)]
#[path = "activation_tests.rs"]
mod tests;
