// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{is_update, PolicyInput, TerminationPolicy};
use reaper_core::pod;
use reaper_core::{OfflineCause, Termination};

/// Reason a container reports when it exits on its own after finishing.
const COMPLETED: &str = "Completed";

/// Fires when a regular container terminated with a non-zero exit code or
/// an unexpected reason. Init containers are expected to terminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerTerminatedPolicy;

impl TerminationPolicy for ContainerTerminatedPolicy {
    fn name(&self) -> &'static str {
        "container-terminated"
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Termination> {
        if !is_update(input.action) {
            return None;
        }
        pod::container_statuses(input.pod).iter().find_map(|status| {
            let state = pod::terminated(status)?;
            let reason = state.reason.as_deref();
            if state.exit_code == 0 && reason.is_none_or(|r| r == COMPLETED) {
                return None;
            }
            let cause = OfflineCause::ContainerTerminated {
                pod: input.pod_ref.clone(),
                container: status.name.clone(),
                exit_code: state.exit_code,
                reason: reason.map(str::to_string),
            };
            let reason = match reason {
                Some(r) => r.to_string(),
                None => format!("ExitCode:{}", state.exit_code),
            };
            Some(Termination::new(reason, cause))
        })
    }
}

#[cfg(test)]
#[path = "container_terminated_tests.rs"]
mod tests;
