// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod event listener that writes an audit line per agent-affecting event.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Pod;
use reaper_core::{pod, AgentRecord, PodAction};
use reaper_engine::PodEventListener;

pub struct AuditListener;

impl PodEventListener for AuditListener {
    fn on_event(
        &self,
        action: PodAction,
        agent: &AgentRecord,
        pod: &Pod,
        reasons: &BTreeSet<String>,
    ) -> anyhow::Result<()> {
        let phase = pod::phase(pod).unwrap_or("-");
        if action == PodAction::Deleted || !reasons.is_empty() {
            let reasons: Vec<&str> = reasons.iter().map(String::as_str).collect();
            tracing::info!(
                agent = %agent.name,
                cloud = %agent.cloud,
                pod = %agent.pod,
                %action,
                phase,
                reasons = %reasons.join(","),
                "agent pod event"
            );
        } else {
            tracing::debug!(agent = %agent.name, pod = %agent.pod, %action, phase, "agent pod event");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
