// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory cluster for tests.

use super::{ClusterClient, ClusterConnector, ClusterError, PodWatch};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use parking_lot::Mutex;
use reaper_core::pod::pod_ref;
use reaper_core::{Cloud, CloudInstanceId, PodEvent, PodRef};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Recorded cluster call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Watch { namespace: String },
    GetPod(PodRef),
    ListPods { namespace: String },
    DeletePod(PodRef),
}

struct FakeWatch {
    namespace: String,
    tx: mpsc::Sender<PodEvent>,
    cancel: CancellationToken,
}

impl FakeWatch {
    fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }
}

#[derive(Default)]
struct FakeClusterState {
    pods: BTreeMap<PodRef, Pod>,
    watches: Vec<FakeWatch>,
    calls: Vec<ClusterCall>,
    watch_error: Option<ClusterError>,
    get_error: Option<ClusterError>,
}

/// Fake cluster: a pod table plus any number of scripted watch streams.
#[derive(Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<FakeClusterState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pod so `get_pod`/`list_pods` find it.
    pub fn add_pod(&self, pod: Pod) {
        if let Some(key) = pod_ref(&pod) {
            self.inner.lock().pods.insert(key, pod);
        }
    }

    pub fn remove_pod(&self, pod: &PodRef) {
        self.inner.lock().pods.remove(pod);
    }

    pub fn has_pod(&self, pod: &PodRef) -> bool {
        self.inner.lock().pods.contains_key(pod)
    }

    /// Make every following `watch` call fail with `error` (or succeed again).
    pub fn fail_watches(&self, error: Option<ClusterError>) {
        self.inner.lock().watch_error = error;
    }

    pub fn fail_gets(&self, error: Option<ClusterError>) {
        self.inner.lock().get_error = error;
    }

    /// Deliver an event to every open watch; returns how many received it.
    pub fn emit(&self, event: PodEvent) -> usize {
        let inner = self.inner.lock();
        inner
            .watches
            .iter()
            .filter(|w| w.is_open())
            .filter(|w| event.pod().and_then(pod_ref).is_none_or(|p| p.namespace == w.namespace))
            .filter(|w| w.tx.try_send(event.clone()).is_ok())
            .count()
    }

    /// End every open watch stream, as a transport that gave up would.
    pub fn close_watches(&self) {
        self.inner.lock().watches.clear();
    }

    /// Number of watches opened so far.
    pub fn watch_count(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, ClusterCall::Watch { .. })).count()
    }

    /// Number of watches whose consumer is still listening.
    pub fn open_watches(&self) -> usize {
        self.inner.lock().watches.iter().filter(|w| w.is_open()).count()
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.inner.lock().calls.clone()
    }

    pub fn get_pod_calls(&self, pod: &PodRef) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, ClusterCall::GetPod(p) if p == pod))
            .count()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn watch(&self, namespace: &str) -> Result<PodWatch, ClusterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ClusterCall::Watch { namespace: namespace.to_string() });
        if let Some(e) = inner.watch_error.clone() {
            return Err(e);
        }
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        inner.watches.retain(FakeWatch::is_open);
        inner.watches.push(FakeWatch { namespace: namespace.to_string(), tx, cancel: cancel.clone() });
        Ok(PodWatch::new(rx, cancel))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        let key = PodRef::new(namespace, name);
        let mut inner = self.inner.lock();
        inner.calls.push(ClusterCall::GetPod(key.clone()));
        if let Some(e) = inner.get_error.clone() {
            return Err(e);
        }
        Ok(inner.pods.get(&key).cloned())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ClusterCall::ListPods { namespace: namespace.to_string() });
        Ok(inner.pods.iter().filter(|(k, _)| k.namespace == namespace).map(|(_, p)| p.clone()).collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let key = PodRef::new(namespace, name);
        let mut inner = self.inner.lock();
        inner.calls.push(ClusterCall::DeletePod(key.clone()));
        inner.pods.remove(&key);
        Ok(())
    }
}

#[derive(Default)]
struct FakeConnectorState {
    clusters: HashMap<String, FakeCluster>,
    connects: Vec<(String, CloudInstanceId)>,
    connect_error: Option<ClusterError>,
}

/// Hands out one [`FakeCluster`] per API server URL (or per cloud name when
/// the cloud has no URL).
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<FakeConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cluster behind `key` (server URL or cloud name), created on demand.
    pub fn cluster(&self, key: &str) -> FakeCluster {
        self.inner.lock().clusters.entry(key.to_string()).or_default().clone()
    }

    pub fn fail_connects(&self, error: Option<ClusterError>) {
        self.inner.lock().connect_error = error;
    }

    /// Cloud instances connected so far, in order.
    pub fn connects(&self) -> Vec<(String, CloudInstanceId)> {
        self.inner.lock().connects.clone()
    }

    fn key(cloud: &Cloud) -> String {
        cloud.server_url.clone().unwrap_or_else(|| cloud.name().to_string())
    }
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(&self, cloud: &Cloud) -> Result<Arc<dyn ClusterClient>, ClusterError> {
        let mut inner = self.inner.lock();
        inner.connects.push((cloud.name().to_string(), cloud.instance().clone()));
        if let Some(e) = inner.connect_error.clone() {
            return Err(e);
        }
        let cluster = inner.clusters.entry(Self::key(cloud)).or_default().clone();
        Ok(Arc::new(cluster))
    }
}
