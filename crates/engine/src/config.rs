// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables for the reconciliation engine.

use std::time::Duration;

/// Engine settings. Transport settings live with the cluster connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Consecutive distinct back-off events before an agent is terminated
    pub image_pull_backoff_limit: u32,
    /// How long a pod may report phase `Unknown` before it counts as failed
    pub unknown_phase_grace: Duration,
    /// Back-off tallies not updated for this long start over
    pub tally_ttl: Duration,
    /// How long termination reasons stay queryable after being recorded
    pub reasons_ttl: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            image_pull_backoff_limit: 3,
            unknown_phase_grace: Duration::from_secs(300),
            tally_ttl: Duration::from_secs(1800),
            reasons_ttl: Duration::from_secs(3600),
        }
    }
}

impl ReaperConfig {
    reaper_core::setters! {
        set {
            image_pull_backoff_limit: u32,
            unknown_phase_grace: Duration,
            tally_ttl: Duration,
            reasons_ttl: Duration,
        }
    }
}
