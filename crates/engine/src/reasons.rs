// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recently observed termination reasons, per agent.
//!
//! Reasons outlive the agent record itself so that whoever decides whether a
//! failed build step may be retried can still ask after the agent is gone.

use parking_lot::Mutex;
use reaper_core::Clock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Now = Arc<dyn Fn() -> Instant + Send + Sync>;

struct Entry {
    reasons: BTreeSet<String>,
    updated: Instant,
}

/// Reason strings keyed by agent name, expiring `ttl` after the last update.
pub struct TerminationReasons {
    now: Now,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl TerminationReasons {
    pub fn new<C: Clock>(clock: C, ttl: Duration) -> Self {
        Self { now: Arc::new(move || clock.now()), ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn record(&self, agent: &str, reason: impl Into<String>) {
        let now = (self.now)();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| now.duration_since(e.updated) < self.ttl);
        let entry = entries
            .entry(agent.to_string())
            .or_insert_with(|| Entry { reasons: BTreeSet::new(), updated: now });
        entry.reasons.insert(reason.into());
        entry.updated = now;
    }

    /// Reasons recorded for `agent` that have not expired.
    pub fn get(&self, agent: &str) -> BTreeSet<String> {
        let now = (self.now)();
        self.entries
            .lock()
            .get(agent)
            .filter(|e| now.duration_since(e.updated) < self.ttl)
            .map(|e| e.reasons.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "reasons_tests.rs"]
mod tests;
