// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{eventually, TestContext};
use reaper_adapters::{ClusterCall, ClusterError};
use reaper_core::test_support::{pod, running, terminated, waiting, with_containers, with_resource_version};
use reaper_core::{Cloud, OfflineCause, PodAction, PodEvent, PodRef, WatchStatus};
use std::time::Duration;

#[tokio::test]
async fn nothing_is_watched_before_activation() {
    let ctx = TestContext::new();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!ctx.reaper.is_activated());
    assert!(!ctx.reaper.is_watching_cloud("k8s").await);
    assert!(ctx.connector.connects().is_empty());
}

#[tokio::test]
async fn activation_watches_every_cloud() {
    let ctx = TestContext::new();
    ctx.store.upsert(Cloud::new("second"));

    assert!(ctx.reaper.maybe_activate().await.unwrap());

    ctx.wait_watching("k8s", true).await;
    ctx.wait_watching("second", true).await;
    assert_eq!(ctx.reaper.watched_clouds().await, vec!["k8s", "second"]);
}

#[tokio::test]
async fn deleted_pod_removes_agent() {
    let ctx = TestContext::new();
    ctx.add_agent("node-123");
    ctx.add_agent("node-456");
    let cluster = ctx.cluster("k8s");
    cluster.add_pod(pod("foo", "node-123"));
    cluster.add_pod(pod("foo", "node-456"));
    ctx.activate().await;
    let before = ctx.registry.len();

    cluster.emit(PodEvent::Deleted(pod("foo", "node-123")));

    eventually("agent removed", || ctx.registry.get_agent("node-123").is_none()).await;
    assert_eq!(ctx.registry.len(), before - 1);
    assert_eq!(ctx.log.actions(), vec![PodAction::Deleted]);
    assert!(ctx.reaper.is_watching_cloud("k8s").await);
}

#[tokio::test]
async fn terminated_container_terminates_agent_but_keeps_record() {
    let ctx = TestContext::new();
    ctx.add_agent("node-123");
    ctx.cluster("k8s").add_pod(pod("foo", "node-123"));
    ctx.activate().await;

    let terminated_pod = with_containers(pod("foo", "node-123"), vec![terminated("jnlp", 123, "because")]);
    ctx.cluster("k8s").emit(PodEvent::Modified(terminated_pod));

    eventually("agent terminated", || {
        ctx.registry.computer("node-123").is_some_and(|c| c.terminated)
    })
    .await;
    let computer = ctx.registry.computer("node-123").unwrap();
    assert!(!computer.online);
    assert!(matches!(
        computer.offline_cause,
        Some(OfflineCause::ContainerTerminated { exit_code: 123, .. })
    ));
    assert!(ctx.registry.get_agent("node-123").is_some());
    assert!(ctx.reaper.termination_reasons("node-123").contains("because"));

    // The record goes once the pod is actually deleted
    ctx.cluster("k8s").emit(PodEvent::Deleted(pod("foo", "node-123")));
    eventually("agent removed", || ctx.registry.get_agent("node-123").is_none()).await;
    assert!(ctx.reaper.termination_reasons("node-123").contains("because"));
}

#[tokio::test]
async fn gone_error_reopens_watch() {
    let ctx = TestContext::new();
    ctx.activate().await;
    let cluster = ctx.cluster("k8s");

    cluster.emit(PodEvent::Error(WatchStatus::new(410, "Expired", "too old resource version")));

    eventually("second watch opened", || cluster.watch_count() == 2).await;
    ctx.wait_watching("k8s", true).await;
    let watches: Vec<_> =
        cluster.calls().into_iter().filter(|c| matches!(c, ClusterCall::Watch { .. })).collect();
    assert_eq!(watches, vec![ClusterCall::Watch { namespace: "foo".into() }; 2]);
    assert_eq!(cluster.open_watches(), 1);
}

#[tokio::test]
async fn server_error_keeps_watching() {
    let ctx = TestContext::new();
    ctx.add_agent("node-123");
    ctx.cluster("k8s").add_pod(pod("foo", "node-123"));
    ctx.activate().await;
    let cluster = ctx.cluster("k8s");

    assert_eq!(cluster.emit(PodEvent::Error(WatchStatus::new(500, "InternalError", "etcd timeout"))), 1);
    // A later event is still delivered on the same watch
    cluster.emit(PodEvent::Modified(with_containers(pod("foo", "node-123"), vec![running("jnlp")])));

    eventually("event after error processed", || !ctx.log.seen().is_empty()).await;
    assert!(ctx.reaper.is_watching_cloud("k8s").await);
    assert_eq!(cluster.watch_count(), 1);
    let computer = ctx.registry.computer("node-123").unwrap();
    assert_eq!(computer.disconnects, 0);
    assert!(computer.online);
}

#[tokio::test]
async fn replaced_cloud_moves_watch_to_new_instance() {
    let ctx = TestContext::new();
    ctx.add_agent("node-123");
    ctx.cluster("k8s").add_pod(pod("foo", "node-123"));
    ctx.activate().await;
    let old = ctx.cluster("k8s");

    let replacement = Cloud::new("k8s").namespace("foo").server_url("https://new.example");
    ctx.store.upsert(replacement.clone());

    let new = ctx.cluster("https://new.example");
    eventually("new watch opened", || new.open_watches() == 1).await;
    ctx.wait_watching("k8s", true).await;
    assert_eq!(old.open_watches(), 0);
    assert_eq!(ctx.connector.connects().last().map(|(_, id)| id.clone()), Some(replacement.instance().clone()));

    // The old cluster no longer reaches the agent; the new one does
    assert_eq!(old.emit(PodEvent::Deleted(pod("foo", "node-123"))), 0);
    assert_eq!(new.emit(PodEvent::Deleted(pod("foo", "node-123"))), 1);
    eventually("agent removed", || ctx.registry.get_agent("node-123").is_none()).await;
}

#[tokio::test]
async fn at_most_one_watch_per_cloud() {
    let ctx = TestContext::new();
    ctx.activate().await;

    for i in 0..5 {
        ctx.store.upsert(Cloud::new("k8s").namespace("foo").server_url(format!("https://c{}", i)));
        if i % 2 == 0 {
            ctx.store.remove("k8s");
            ctx.store.upsert(Cloud::new("k8s").namespace("foo").server_url(format!("https://c{}", i)));
        }
        let watched = ctx.reaper.watched_clouds().await;
        assert!(watched.iter().filter(|c| c.as_str() == "k8s").count() <= 1);
    }

    let current = ctx.store.get("k8s").unwrap();
    eventually("current instance watched", || {
        ctx.connector.connects().last().is_some_and(|(_, id)| id == current.instance())
            && ctx.cluster("https://c4").open_watches() == 1
    })
    .await;
    let open: usize = std::iter::once("k8s".to_string())
        .chain((0..5).map(|i| format!("https://c{}", i)))
        .map(|key| ctx.cluster(&key).open_watches())
        .sum();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn removed_cloud_stops_being_watched() {
    let ctx = TestContext::new();
    ctx.activate().await;

    ctx.store.remove("k8s");

    ctx.wait_watching("k8s", false).await;
    assert_eq!(ctx.cluster("k8s").open_watches(), 0);
    assert!(ctx.reaper.watched_clouds().await.is_empty());
}

#[tokio::test]
async fn shutdown_closes_every_watch() {
    let ctx = TestContext::new();
    ctx.store.upsert(Cloud::new("second"));
    ctx.activate().await;
    ctx.wait_watching("second", true).await;

    ctx.reaper.shutdown().await;

    assert_eq!(ctx.cluster("k8s").open_watches(), 0);
    assert_eq!(ctx.cluster("second").open_watches(), 0);
    assert!(!ctx.reaper.is_watching_cloud("k8s").await);
    assert!(ctx.reaper.watched_clouds().await.is_empty());
    // A second shutdown is harmless
    ctx.reaper.shutdown().await;
}

#[tokio::test]
async fn cloud_changes_after_shutdown_open_nothing() {
    let ctx = TestContext::new();
    ctx.activate().await;
    ctx.reaper.shutdown().await;

    ctx.store.upsert(Cloud::new("late"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(ctx.connector.connects().iter().all(|(name, _)| name != "late"));
    assert_eq!(ctx.reaper.maybe_activate().await, Err(ReaperError::Stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_activation_reconciles_once() {
    let ctx = TestContext::new();
    ctx.add_agent("node-1");
    ctx.cluster("k8s").add_pod(pod("foo", "node-1"));

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let reaper = ctx.reaper.clone();
            tokio::spawn(async move { reaper.maybe_activate().await })
        })
        .collect();
    let mut activated = 0;
    for call in calls {
        if call.await.unwrap().unwrap() {
            activated += 1;
        }
    }

    assert_eq!(activated, 1);
    assert_eq!(ctx.cluster("k8s").get_pod_calls(&PodRef::new("foo", "node-1")), 1);
    assert!(!ctx.reaper.maybe_activate().await.unwrap());
}

#[tokio::test]
async fn activation_removes_agents_without_pods() {
    let ctx = TestContext::new();
    ctx.add_agent("alive");
    ctx.add_agent("vanished");
    ctx.cluster("k8s").add_pod(pod("foo", "alive"));

    ctx.reaper.maybe_activate().await.unwrap();

    assert!(ctx.registry.get_agent("alive").is_some());
    assert!(ctx.registry.get_agent("vanished").is_none());
}

#[tokio::test]
async fn image_pull_backoff_needs_repeated_events() {
    let ctx = TestContext::with_config(ReaperConfig::default().image_pull_backoff_limit(3));
    ctx.add_agent("node-1");
    ctx.cluster("k8s").add_pod(pod("foo", "node-1"));
    ctx.activate().await;
    let cluster = ctx.cluster("k8s");
    let stuck = |version: &str| {
        PodEvent::Modified(with_resource_version(
            with_containers(pod("foo", "node-1"), vec![waiting("jnlp", "ImagePullBackOff")]),
            version,
        ))
    };

    cluster.emit(stuck("2"));
    cluster.emit(stuck("3"));
    eventually("two events seen", || ctx.log.seen().len() == 2).await;
    assert!(!ctx.registry.computer("node-1").unwrap().terminated);

    cluster.emit(stuck("4"));
    eventually("agent terminated", || {
        ctx.registry.computer("node-1").is_some_and(|c| c.terminated)
    })
    .await;
    assert!(ctx.reaper.termination_reasons("node-1").contains("ImagePullBackOff"));
}

#[tokio::test]
async fn pre_launch_activates_and_watches_new_cloud() {
    let ctx = TestContext::new();
    ctx.reaper.maybe_activate().await.unwrap();
    ctx.wait_watching("k8s", true).await;

    // Fails at first, so activation leaves it closed
    ctx.connector.fail_connects(Some(ClusterError::Connect("not yet".into())));
    ctx.store.upsert(Cloud::new("fresh"));
    eventually("connect attempted", || {
        ctx.connector.connects().iter().any(|(name, _)| name == "fresh")
    })
    .await;
    ctx.wait_watching("fresh", false).await;

    ctx.connector.fail_connects(None);
    let agent = reaper_core::AgentRecordBuilder::default()
        .name("n")
        .cloud("fresh")
        .pod(PodRef::new("default", "n"))
        .build();
    ctx.reaper.pre_launch(&agent).await.unwrap();

    ctx.wait_watching("fresh", true).await;
}

#[tokio::test]
async fn pre_launch_triggers_activation() {
    let ctx = TestContext::new();
    let agent = ctx.add_agent("node-1");
    ctx.cluster("k8s").add_pod(pod("foo", "node-1"));

    ctx.reaper.pre_launch(&agent).await.unwrap();

    assert!(ctx.reaper.is_activated());
    ctx.wait_watching("k8s", true).await;
}

#[tokio::test]
async fn transport_closure_deregisters_watcher() {
    let ctx = TestContext::new();
    ctx.activate().await;

    ctx.cluster("k8s").close_watches();

    ctx.wait_state("k8s", None).await;
    // The next trigger opens it again
    let agent = ctx.add_agent("node-1");
    ctx.reaper.pre_launch(&agent).await.unwrap();
    ctx.wait_watching("k8s", true).await;
}

#[tokio::test]
async fn events_for_untracked_pods_are_not_reported() {
    let ctx = TestContext::new();
    ctx.add_agent("node-1");
    ctx.cluster("k8s").add_pod(pod("foo", "node-1"));
    ctx.activate().await;
    let cluster = ctx.cluster("k8s");

    cluster.emit(PodEvent::Deleted(pod("foo", "unrelated")));
    cluster.emit(PodEvent::Bookmark { resource_version: "10".into() });
    cluster.emit(PodEvent::Added(pod("foo", "node-1")));

    eventually("tracked event seen", || !ctx.log.seen().is_empty()).await;
    assert_eq!(ctx.log.actions(), vec![PodAction::Added]);
    assert_eq!(ctx.registry.len(), 1);
}

#[tokio::test]
async fn install_makes_a_single_instance() {
    let ctx = TestContext::new();
    let other = TestContext::new();

    let installed = ctx.reaper.clone().install().unwrap();
    assert_eq!(other.reaper.clone().install().err(), Some(ReaperError::AlreadyInstalled));
    assert!(Reaper::get_instance().is_some_and(|r| Arc::ptr_eq(&r.inner, &installed.inner)));
}

#[tokio::test]
async fn termination_reasons_expire() {
    let ctx = TestContext::with_config(ReaperConfig::default().reasons_ttl(Duration::from_secs(60)));
    ctx.add_agent("node-1");
    ctx.cluster("k8s").add_pod(pod("foo", "node-1"));
    ctx.activate().await;

    let evicted = reaper_core::test_support::with_status_reason(
        reaper_core::test_support::with_phase(pod("foo", "node-1"), "Failed"),
        "Evicted",
    );
    ctx.cluster("k8s").emit(PodEvent::Modified(evicted));
    eventually("reason recorded", || !ctx.reaper.termination_reasons("node-1").is_empty()).await;
    assert!(ctx.reaper.termination_reasons("node-1").contains("Evicted"));

    ctx.clock.advance(Duration::from_secs(60));
    assert!(ctx.reaper.termination_reasons("node-1").is_empty());
}
