// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod retention: whether a pod is kept once its agent is terminated.

use crate::pod;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// Whether to retain an agent's pod after the agent terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PodRetention {
    /// Keep every pod.
    Always,
    /// Never keep a pod; delete it once the agent is gone.
    #[default]
    Never,
    /// Keep pods that failed so they can be inspected.
    OnFailure,
}

crate::simple_display! {
    PodRetention {
        Always => "always",
        Never => "never",
        OnFailure => "on-failure",
    }
}

impl PodRetention {
    /// Decide whether the pod backing a terminated agent should be deleted.
    ///
    /// `None` means the pod no longer exists, so there is nothing to delete.
    pub fn should_delete(self, pod: Option<&Pod>) -> bool {
        let Some(pod) = pod else { return false };
        match self {
            PodRetention::Always => false,
            PodRetention::Never => true,
            PodRetention::OnFailure => !pod::has_failed(pod),
        }
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
