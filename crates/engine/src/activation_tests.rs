// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::agent;
use reaper_adapters::{ClusterError, FakeConnector, NodeRegistry};
use reaper_core::test_support::pod;
use reaper_core::{AgentRecordBuilder, Cloud, PodRef};

fn setup() -> (NodeRegistry, FakeConnector, CloudStore) {
    let registry = NodeRegistry::new();
    let connector = FakeConnector::new();
    let store = CloudStore::with_clouds([Cloud::new("k8s").namespace("foo")]);
    (registry, connector, store)
}

#[tokio::test]
async fn removes_agents_whose_pod_is_gone() {
    let (registry, connector, store) = setup();
    registry.add_agent(agent("alive")).unwrap();
    registry.add_agent(agent("gone")).unwrap();
    connector.cluster("k8s").add_pod(pod("foo", "alive"));

    let summary = reconcile_agents(&registry, &connector, &store).await;

    assert_eq!(summary, ReconcileSummary { checked: 2, removed: 1, failed: 0 });
    assert!(registry.get_agent("alive").is_some());
    assert!(registry.get_agent("gone").is_none());
}

#[tokio::test]
async fn api_errors_keep_the_agent() {
    let (registry, connector, store) = setup();
    registry.add_agent(agent("node-1")).unwrap();
    connector.cluster("k8s").fail_gets(Some(ClusterError::Api { code: 500, message: "boom".into() }));

    let summary = reconcile_agents(&registry, &connector, &store).await;

    assert_eq!(summary.failed, 1);
    assert!(registry.get_agent("node-1").is_some());
}

#[tokio::test]
async fn unreachable_cloud_is_connected_once() {
    let (registry, connector, store) = setup();
    registry.add_agent(agent("a")).unwrap();
    registry.add_agent(agent("b")).unwrap();
    connector.fail_connects(Some(ClusterError::Connect("no route".into())));

    let summary = reconcile_agents(&registry, &connector, &store).await;

    assert_eq!(summary, ReconcileSummary { checked: 0, removed: 0, failed: 2 });
    assert_eq!(connector.connects().len(), 1);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn agents_of_unknown_clouds_are_skipped() {
    let (registry, connector, store) = setup();
    registry
        .add_agent(AgentRecordBuilder::default().name("x").cloud("elsewhere").pod(PodRef::new("foo", "x")).build())
        .unwrap();

    let summary = reconcile_agents(&registry, &connector, &store).await;

    assert_eq!(summary, ReconcileSummary::default());
    assert!(registry.get_agent("x").is_some());
    assert!(connector.connects().is_empty());
}

#[tokio::test]
async fn checks_pod_in_the_agent_namespace() {
    let (registry, connector, store) = setup();
    registry
        .add_agent(AgentRecordBuilder::default().name("x").pod(PodRef::new("other-ns", "x")).build())
        .unwrap();
    connector.cluster("k8s").add_pod(pod("other-ns", "x"));

    reconcile_agents(&registry, &connector, &store).await;

    assert!(registry.get_agent("x").is_some());
    assert_eq!(connector.cluster("k8s").get_pod_calls(&PodRef::new("other-ns", "x")), 1);
}
