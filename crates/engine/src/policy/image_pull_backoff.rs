// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{is_update, PolicyInput, TerminationPolicy};
use parking_lot::Mutex;
use reaper_core::pod;
use reaper_core::{Clock, OfflineCause, PodRef, Termination};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Waiting reasons that mean the image cannot be pulled.
const BACKOFF_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];

/// Consecutive back-off observations for one pod.
#[derive(Debug, Clone)]
struct Tally {
    count: u32,
    /// Resource version of the last counted snapshot
    last_version: Option<String>,
    updated: Instant,
}

/// Fires when a container keeps waiting on an image pull across N
/// consecutive distinct watch events.
///
/// A snapshot without a back-off reason resets the tally. Snapshots are
/// told apart by resource version, so an event replayed after a resync is
/// not counted twice. A tally that sees no update for `ttl` starts over.
pub struct ImagePullBackOffPolicy<C: Clock> {
    clock: C,
    limit: u32,
    ttl: Duration,
    tallies: Mutex<HashMap<PodRef, Tally>>,
}

impl<C: Clock> ImagePullBackOffPolicy<C> {
    pub fn new(clock: C, limit: u32, ttl: Duration) -> Self {
        Self { clock, limit: limit.max(1), ttl, tallies: Mutex::new(HashMap::new()) }
    }

    /// Current tally for a pod, for diagnostics.
    pub fn occurrences(&self, pod: &PodRef) -> u32 {
        self.tallies.lock().get(pod).map_or(0, |t| t.count)
    }
}

impl<C: Clock> TerminationPolicy for ImagePullBackOffPolicy<C> {
    fn name(&self) -> &'static str {
        "image-pull-backoff"
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Termination> {
        if !is_update(input.action) {
            return None;
        }
        let now = self.clock.now();
        let mut tallies = self.tallies.lock();
        tallies.retain(|_, t| now.duration_since(t.updated) < self.ttl);

        let stuck = pod::init_container_statuses(input.pod)
            .iter()
            .chain(pod::container_statuses(input.pod))
            .filter_map(|s| Some((s, pod::waiting(s)?.reason.as_deref()?)))
            .find(|(_, reason)| BACKOFF_REASONS.contains(reason));
        let Some((status, reason)) = stuck else {
            tallies.remove(input.pod_ref);
            return None;
        };

        let version = pod::resource_version(input.pod);
        let tally = tallies
            .entry(input.pod_ref.clone())
            .or_insert(Tally { count: 0, last_version: None, updated: now });
        if version.is_some() && tally.last_version.as_deref() == version {
            return None;
        }
        tally.count += 1;
        tally.last_version = version.map(str::to_string);
        tally.updated = now;

        let limit = input
            .agent
            .template
            .as_ref()
            .and_then(|t| t.image_pull_backoff_limit)
            .map_or(self.limit, |l| l.max(1));
        tracing::debug!(
            pod = %input.pod_ref,
            container = %status.name,
            reason,
            count = tally.count,
            limit,
            "image pull back-off observed"
        );
        if tally.count < limit {
            return None;
        }
        let cause = OfflineCause::ImagePullBackOff {
            pod: input.pod_ref.clone(),
            container: status.name.clone(),
            reason: reason.to_string(),
            occurrences: tally.count,
        };
        Some(Termination::new(reason, cause))
    }

    fn forget(&self, pod: &PodRef) {
        self.tallies.lock().remove(pod);
    }
}

#[cfg(test)]
#[path = "image_pull_backoff_tests.rs"]
mod tests;
