// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination policies.
//!
//! Each policy looks at one pod snapshot of a tracked agent and may decide
//! the agent must go. Policies are independent: any one firing is enough,
//! and the order they run in does not matter because termination is
//! idempotent. Pod deletion is not a policy; the event path handles it.

mod container_terminated;
mod image_pull_backoff;
mod pod_failed;

pub use container_terminated::ContainerTerminatedPolicy;
pub use image_pull_backoff::ImagePullBackOffPolicy;
pub use pod_failed::PodFailedPolicy;

use crate::config::ReaperConfig;
use k8s_openapi::api::core::v1::Pod;
use reaper_core::{AgentRecord, Clock, PodAction, PodRef, Termination};
use std::sync::Arc;

/// What a policy gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub action: PodAction,
    pub agent: &'a AgentRecord,
    pub pod_ref: &'a PodRef,
    pub pod: &'a Pod,
}

pub trait TerminationPolicy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Decide whether the agent should be terminated.
    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Termination>;

    /// Drop any per-pod state, called once the pod is gone.
    fn forget(&self, _pod: &PodRef) {}
}

/// The built-in policies, configured from `config`.
pub fn default_policies<C: Clock>(config: &ReaperConfig, clock: C) -> Vec<Arc<dyn TerminationPolicy>> {
    vec![
        Arc::new(ContainerTerminatedPolicy),
        Arc::new(PodFailedPolicy::new(clock.clone(), config.unknown_phase_grace)),
        Arc::new(ImagePullBackOffPolicy::new(clock, config.image_pull_backoff_limit, config.tally_ttl)),
    ]
}

/// Policies only look at pods that still exist.
fn is_update(action: PodAction) -> bool {
    matches!(action, PodAction::Added | PodAction::Modified)
}
