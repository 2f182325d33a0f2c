// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod cleanup once an agent's own termination routine runs.
//!
//! The reconciliation core never deletes pods. This hook is installed on the
//! registry instead: when an agent terminates, its cloud's [`PodRetention`]
//! decides whether the pod goes. The pod is only fetched when the policy
//! needs to look at it.
//!
//! [`PodRetention`]: reaper_core::PodRetention

use crate::clouds::CloudStore;
use reaper_adapters::{ClusterConnector, ClusterError, TerminateHook};
use reaper_core::{AgentRecord, PodRetention};
use std::sync::Arc;

#[derive(Clone)]
pub struct RetentionHook {
    store: CloudStore,
    connector: Arc<dyn ClusterConnector>,
}

impl RetentionHook {
    pub fn new(store: CloudStore, connector: Arc<dyn ClusterConnector>) -> Self {
        Self { store, connector }
    }

    /// Apply the retention policy to the agent's pod. Returns whether the
    /// pod was deleted.
    pub async fn apply(&self, agent: &AgentRecord) -> Result<bool, ClusterError> {
        let Some(cloud) = self.store.get(&agent.cloud) else {
            tracing::debug!(agent = %agent.name, cloud = %agent.cloud, "cloud gone, keeping pod");
            return Ok(false);
        };
        if cloud.pod_retention == PodRetention::Always {
            return Ok(false);
        }
        let client = self.connector.connect(&cloud).await?;
        let pod = client.get_pod(&agent.pod.namespace, &agent.pod.name).await?;
        if !cloud.pod_retention.should_delete(pod.as_ref()) {
            tracing::debug!(
                agent = %agent.name,
                pod = %agent.pod,
                retention = %cloud.pod_retention,
                "retaining pod"
            );
            return Ok(false);
        }
        client.delete_pod(&agent.pod.namespace, &agent.pod.name).await?;
        tracing::info!(
            agent = %agent.name,
            pod = %agent.pod,
            retention = %cloud.pod_retention,
            "deleted pod"
        );
        Ok(true)
    }
}

impl TerminateHook for RetentionHook {
    fn on_terminate(&self, agent: &AgentRecord) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(agent = %agent.name, "no runtime to apply pod retention");
            return;
        };
        let hook = self.clone();
        let agent = agent.clone();
        runtime.spawn(async move {
            if let Err(e) = hook.apply(&agent).await {
                tracing::warn!(
                    agent = %agent.name,
                    pod = %agent.pod,
                    error = %e,
                    "pod retention failed"
                );
            }
        });
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
