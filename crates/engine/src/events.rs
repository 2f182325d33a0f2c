// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event reconciliation: correlate, evaluate policies, act, notify.

use crate::correlation;
use crate::listener::Listeners;
use crate::policy::{PolicyInput, TerminationPolicy};
use crate::reasons::TerminationReasons;
use k8s_openapi::api::core::v1::Pod;
use reaper_adapters::AgentRegistry;
use reaper_core::pod::{self, pod_ref};
use reaper_core::{AgentRecord, Cloud, OfflineCause, PodAction, PodEvent, PodRef, Termination};
use std::sync::Arc;

/// What the watcher should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The watch history is gone; reopen from current state
    Resync,
}

/// Shared by every watcher of one coordinator.
pub(crate) struct EventProcessor {
    pub(crate) registry: Arc<dyn AgentRegistry>,
    pub(crate) policies: Vec<Arc<dyn TerminationPolicy>>,
    pub(crate) listeners: Listeners,
    pub(crate) reasons: Arc<TerminationReasons>,
}

impl EventProcessor {
    pub(crate) fn process(&self, cloud: &Cloud, event: PodEvent) -> Flow {
        let action = event.action();
        match event {
            PodEvent::Bookmark { resource_version } => {
                tracing::trace!(cloud = %cloud.name(), %resource_version, "bookmark");
                Flow::Continue
            }
            PodEvent::Error(status) if status.is_gone() => {
                tracing::info!(
                    cloud = %cloud.name(),
                    detail = %status.message,
                    "watch history expired, resyncing"
                );
                Flow::Resync
            }
            PodEvent::Error(status) => {
                tracing::warn!(
                    cloud = %cloud.name(),
                    code = status.code,
                    reason = %status.reason,
                    detail = %status.message,
                    "pod watch reported an error, keeping watch open"
                );
                Flow::Continue
            }
            PodEvent::Added(pod) | PodEvent::Modified(pod) => {
                self.on_update(cloud, action, &pod);
                Flow::Continue
            }
            PodEvent::Deleted(pod) => {
                self.on_deleted(cloud, &pod);
                Flow::Continue
            }
        }
    }

    fn correlate(&self, cloud: &Cloud, pod: &Pod) -> Option<(PodRef, AgentRecord)> {
        let pod_ref = pod_ref(pod)?;
        match correlation::find_cloud_agent_for_pod(self.registry.as_ref(), cloud.name(), &pod_ref) {
            Some(agent) => Some((pod_ref, agent)),
            None => {
                tracing::debug!(cloud = %cloud.name(), pod = %pod_ref, "no agent for pod");
                None
            }
        }
    }

    fn on_update(&self, cloud: &Cloud, action: PodAction, pod: &Pod) {
        let Some((pod_ref, agent)) = self.correlate(cloud, pod) else { return };
        self.record_observed(&agent, pod);

        let input = PolicyInput { action, agent: &agent, pod_ref: &pod_ref, pod };
        let terminations: Vec<Termination> =
            self.policies.iter().filter_map(|p| p.evaluate(&input)).collect();
        for t in &terminations {
            self.reasons.record(&agent.name, t.reason.as_str());
        }
        if let Some(first) = terminations.into_iter().next() {
            self.terminate(&agent, first);
        }
        self.listeners.notify(action, &agent, pod, &self.reasons.get(&agent.name));
    }

    fn on_deleted(&self, cloud: &Cloud, pod: &Pod) {
        if let Some(pod_ref) = pod_ref(pod) {
            for policy in &self.policies {
                policy.forget(&pod_ref);
            }
        }
        let Some((pod_ref, agent)) = self.correlate(cloud, pod) else { return };
        self.record_observed(&agent, pod);

        tracing::info!(
            cloud = %cloud.name(),
            agent = %agent.name,
            pod = %pod_ref,
            "pod deleted, removing agent"
        );
        let cause = OfflineCause::PodDeleted { pod: pod_ref };
        if let Err(e) = self.registry.disconnect(&agent.name, cause) {
            tracing::warn!(agent = %agent.name, error = %e, "failed to disconnect agent");
        }
        self.registry.remove_agent(&agent.name);
        self.listeners.notify(PodAction::Deleted, &agent, pod, &self.reasons.get(&agent.name));
    }

    /// Take the agent offline with the termination's cause, then run its own
    /// termination routine. The record stays until the pod is deleted.
    fn terminate(&self, agent: &AgentRecord, termination: Termination) {
        tracing::info!(
            agent = %agent.name,
            pod = %agent.pod,
            reason = %termination.reason,
            cause = %termination.cause,
            "terminating agent"
        );
        if let Err(e) = self.registry.disconnect(&agent.name, termination.cause) {
            tracing::warn!(agent = %agent.name, error = %e, "failed to disconnect agent");
        }
        if let Err(e) = self.registry.terminate(&agent.name) {
            tracing::warn!(agent = %agent.name, error = %e, "failed to terminate agent");
        }
    }

    /// Reasons the pod itself reports, recorded whether or not a policy fires.
    fn record_observed(&self, agent: &AgentRecord, pod: &Pod) {
        let terminated = pod::container_statuses(pod)
            .iter()
            .filter_map(pod::terminated)
            .filter_map(|t| t.reason.as_deref());
        for reason in terminated.chain(pod::status_reason(pod)) {
            self.reasons.record(&agent.name, reason);
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
