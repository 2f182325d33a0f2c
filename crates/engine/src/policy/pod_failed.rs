// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{is_update, PolicyInput, TerminationPolicy};
use parking_lot::Mutex;
use reaper_core::pod::{self, PHASE_FAILED, PHASE_UNKNOWN};
use reaper_core::{Clock, OfflineCause, PodRef, Termination};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Fires when the pod phase is `Failed`, or has been `Unknown` for longer
/// than the grace window (the node stopped reporting).
pub struct PodFailedPolicy<C: Clock> {
    clock: C,
    unknown_grace: Duration,
    /// When each pod was first seen in phase `Unknown`
    unknown_since: Mutex<HashMap<PodRef, Instant>>,
}

impl<C: Clock> PodFailedPolicy<C> {
    pub fn new(clock: C, unknown_grace: Duration) -> Self {
        Self { clock, unknown_grace, unknown_since: Mutex::new(HashMap::new()) }
    }

    fn terminate(input: &PolicyInput<'_>, phase: &str) -> Termination {
        let status_reason = pod::status_reason(input.pod).map(str::to_string);
        let reason = status_reason.clone().unwrap_or_else(|| phase.to_string());
        let cause = OfflineCause::PodFailed {
            pod: input.pod_ref.clone(),
            phase: phase.to_string(),
            reason: status_reason,
        };
        Termination::new(reason, cause)
    }
}

impl<C: Clock> TerminationPolicy for PodFailedPolicy<C> {
    fn name(&self) -> &'static str {
        "pod-failed"
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Termination> {
        if !is_update(input.action) {
            return None;
        }
        match pod::phase(input.pod) {
            Some(PHASE_FAILED) => {
                self.unknown_since.lock().remove(input.pod_ref);
                Some(Self::terminate(input, PHASE_FAILED))
            }
            Some(PHASE_UNKNOWN) => {
                let now = self.clock.now();
                let since = *self.unknown_since.lock().entry(input.pod_ref.clone()).or_insert(now);
                if now.duration_since(since) < self.unknown_grace {
                    tracing::debug!(pod = %input.pod_ref, "pod phase unknown, within grace window");
                    return None;
                }
                Some(Self::terminate(input, PHASE_UNKNOWN))
            }
            _ => {
                self.unknown_since.lock().remove(input.pod_ref);
                None
            }
        }
    }

    fn forget(&self, pod: &PodRef) {
        self.unknown_since.lock().remove(pod);
    }
}

#[cfg(test)]
#[path = "pod_failed_tests.rs"]
mod tests;
