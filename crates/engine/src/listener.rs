// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observers of processed pod events.
//!
//! Listeners are told about every event that maps to a tracked agent,
//! whether or not it led to a termination. A failing or panicking listener
//! is logged and skipped; it never stops the others or the reconciliation.

use k8s_openapi::api::core::v1::Pod;
use reaper_core::{AgentRecord, PodAction};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub trait PodEventListener: Send + Sync + 'static {
    fn on_event(
        &self,
        action: PodAction,
        agent: &AgentRecord,
        pod: &Pod,
        reasons: &BTreeSet<String>,
    ) -> anyhow::Result<()>;
}

/// A fixed set of listeners, composed at construction.
#[derive(Clone, Default)]
pub struct Listeners {
    listeners: Vec<Arc<dyn PodEventListener>>,
}

impl Listeners {
    pub fn new(listeners: Vec<Arc<dyn PodEventListener>>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify(
        &self,
        action: PodAction,
        agent: &AgentRecord,
        pod: &Pod,
        reasons: &BTreeSet<String>,
    ) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result =
                catch_unwind(AssertUnwindSafe(|| listener.on_event(action, agent, pod, reasons)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    listener = index,
                    agent = %agent.name,
                    %action,
                    error = %e,
                    "pod event listener failed"
                ),
                Err(_) => tracing::error!(
                    listener = index,
                    agent = %agent.name,
                    %action,
                    "pod event listener panicked"
                ),
            }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
