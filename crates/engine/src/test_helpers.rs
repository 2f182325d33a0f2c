// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::listener::PodEventListener;
use crate::{CloudStore, Reaper, ReaperBuilder, ReaperConfig, WatchState};
use k8s_openapi::api::core::v1::Pod;
use parking_lot::Mutex;
use reaper_adapters::{AgentRegistry, FakeCluster, FakeConnector, NodeRegistry};
use reaper_core::{AgentRecord, AgentRecordBuilder, Cloud, FakeClock, PodAction, PodRef};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// One listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Seen {
    pub action: PodAction,
    pub agent: String,
    pub reasons: BTreeSet<String>,
}

/// Listener that records every notification.
#[derive(Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<Seen>>>);

impl EventLog {
    pub fn seen(&self) -> Vec<Seen> {
        self.0.lock().clone()
    }

    pub fn actions(&self) -> Vec<PodAction> {
        self.0.lock().iter().map(|s| s.action).collect()
    }
}

impl PodEventListener for EventLog {
    fn on_event(
        &self,
        action: PodAction,
        agent: &AgentRecord,
        _pod: &Pod,
        reasons: &BTreeSet<String>,
    ) -> anyhow::Result<()> {
        self.0.lock().push(Seen { action, agent: agent.name.clone(), reasons: reasons.clone() });
        Ok(())
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

/// Poll `check` until it holds, failing the test after five seconds.
pub(crate) async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting until {}", what);
        }
        tokio::time::sleep(POLL).await;
    }
}

/// Agent `name` on cloud `k8s`, backed by pod `foo/<name>`.
pub(crate) fn agent(name: &str) -> AgentRecord {
    AgentRecordBuilder::default().name(name).pod(PodRef::new("foo", name)).build()
}

/// A coordinator wired to fakes: cloud `k8s` watching namespace `foo`.
pub(crate) struct TestContext {
    pub reaper: Reaper,
    pub connector: FakeConnector,
    pub registry: NodeRegistry,
    pub store: CloudStore,
    pub clock: FakeClock,
    pub log: EventLog,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ReaperConfig::default())
    }

    pub fn with_config(config: ReaperConfig) -> Self {
        let connector = FakeConnector::new();
        let registry = NodeRegistry::new();
        let store = CloudStore::with_clouds([Cloud::new("k8s").namespace("foo")]);
        let clock = FakeClock::new();
        let log = EventLog::default();
        let reaper = ReaperBuilder::new(
            Arc::new(connector.clone()),
            Arc::new(registry.clone()),
            store.clone(),
        )
        .config(config)
        .clock(clock.clone())
        .listener(Arc::new(log.clone()))
        .start();
        Self { reaper, connector, registry, store, clock, log }
    }

    /// The fake cluster behind cloud `name` (clouds here have no server URL).
    pub fn cluster(&self, name: &str) -> FakeCluster {
        self.connector.cluster(name)
    }

    pub fn add_agent(&self, name: &str) -> AgentRecord {
        let agent = agent(name);
        self.registry.add_agent(agent.clone()).unwrap();
        self.registry.set_online(name).unwrap();
        agent
    }

    /// Activate and wait for the watch on `k8s` to open.
    pub async fn activate(&self) {
        self.reaper.maybe_activate().await.unwrap();
        self.wait_watching("k8s", true).await;
    }

    /// Wait until `cloud` is watched, or until its watcher is deregistered.
    pub async fn wait_watching(&self, cloud: &str, expected: bool) {
        self.wait_state(cloud, expected.then_some(WatchState::Open)).await;
    }

    /// Wait until the watcher of `cloud` is in `state`, or gone for `None`.
    pub async fn wait_state(&self, cloud: &str, state: Option<WatchState>) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            let current = self.reaper.watch_state(cloud).await;
            if current == state {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {} watcher {:?}, still {:?}", cloud, state, current);
            }
            tokio::time::sleep(POLL).await;
        }
    }
}
