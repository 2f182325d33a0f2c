// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kube-rs backed cluster client.
//!
//! Watches are raw `?watch=1` requests rather than `kube::runtime::watcher`
//! streams: the reaper must see `Error` events (and their status codes)
//! itself, which the runtime watcher hides behind its own relist logic.
//!
//! The server ends every watch request after `timeout_secs`; the pump task
//! resumes from the last observed resource version without surfacing
//! anything to the consumer. Connection errors, and requests that end
//! without a single event, are retried with exponential back-off. A 410 is forwarded and ends the stream so the consumer can
//! resync.

use super::{ClusterClient, ClusterConnector, ClusterError, PodWatch};
use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, WatchEvent, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use reaper_core::{Cloud, PodEvent, WatchStatus, HTTP_GONE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events buffered between the pump task and the consumer
const WATCH_BUFFER: usize = 256;

/// Tuning for watch requests and their resumption.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Server-side timeout of one watch request (must stay below 295s)
    pub timeout_secs: u32,
    /// Upper bound for the retry delay
    pub retry_backoff_max: Duration,
    /// Consecutive failed reconnects before the stream is closed
    pub retry_attempts: u32,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 290,
            retry_backoff_max: Duration::from_secs(30),
            retry_attempts: 10,
        }
    }
}

impl WatchSettings {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(250u64.saturating_mul(1 << exp)).min(self.retry_backoff_max)
    }

    /// Delay before the next watch request, or `None` once reconnects have
    /// failed more than `retry_attempts` times in a row.
    ///
    /// Requests the server ended without any event back off as well, but
    /// never exhaust the retry budget.
    pub fn resume_delay(&self, failures: u32, idle: u32) -> Option<Duration> {
        if failures > self.retry_attempts {
            None
        } else if failures > 0 {
            Some(self.backoff(failures))
        } else if idle > 0 {
            Some(self.backoff(idle))
        } else {
            Some(Duration::ZERO)
        }
    }
}

/// Connects to clouds through kube-rs.
#[derive(Debug, Clone, Default)]
pub struct KubeConnector {
    settings: WatchSettings,
}

impl KubeConnector {
    pub fn new(settings: WatchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, cloud: &Cloud) -> Result<Arc<dyn ClusterClient>, ClusterError> {
        let client = match cloud.server_url.as_deref() {
            None => Client::try_default()
                .await
                .map_err(|e| ClusterError::Connect(format!("default kube client: {}", e)))?,
            Some(url) => {
                let kubeconfig = kubeconfig_for(cloud, url)?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| ClusterError::Connect(format!("{}: {}", cloud.name(), e)))?;
                Client::try_from(config)
                    .map_err(|e| ClusterError::Connect(format!("{}: {}", cloud.name(), e)))?
            }
        };
        tracing::debug!(cloud = %cloud, "created kube client");
        Ok(Arc::new(KubeClusterClient { client, settings: self.settings.clone() }))
    }
}

/// Single-context kubeconfig describing one cloud's connection.
///
/// Built as JSON (a YAML subset) so kube-rs applies its usual handling of
/// CA data, TLS verification and tokens.
pub(crate) fn kubeconfig_for(cloud: &Cloud, url: &str) -> Result<Kubeconfig, ClusterError> {
    let mut cluster = serde_json::json!({
        "server": url,
        "insecure-skip-tls-verify": cloud.skip_tls_verify,
    });
    if let Some(pem) = &cloud.server_certificate {
        cluster["certificate-authority-data"] =
            base64::engine::general_purpose::STANDARD.encode(pem.as_bytes()).into();
    }
    let mut user = serde_json::json!({});
    if let Some(token) = &cloud.token {
        user["token"] = token.clone().into();
    }
    let doc = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": cloud.name(), "cluster": cluster }],
        "users": [{ "name": "reaper", "user": user }],
        "contexts": [{
            "name": "reaper",
            "context": {
                "cluster": cloud.name(),
                "user": "reaper",
                "namespace": cloud.pod_namespace(),
            },
        }],
        "current-context": "reaper",
    });
    Kubeconfig::from_yaml(&doc.to_string())
        .map_err(|e| ClusterError::Connect(format!("{}: invalid connection config: {}", cloud.name(), e)))
}

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => ClusterError::Api { code: resp.code, message: resp.message.clone() },
            other => ClusterError::Transport(other.to_string()),
        }
    }
}

pub(crate) struct KubeClusterClient {
    client: Client,
    settings: WatchSettings,
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn watch(&self, namespace: &str) -> Result<PodWatch, ClusterError> {
        let source = ApiWatchSource {
            api: Api::namespaced(self.client.clone(), namespace),
            params: WatchParams::default().timeout(self.settings.timeout_secs),
        };
        // Version "0" replays current pods as ADDED events, which doubles as
        // the resync after a 410.
        let stream = source.watch_from("0").await?;

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let cancel = CancellationToken::new();
        let pump = WatchPump {
            source,
            namespace: namespace.to_string(),
            settings: self.settings.clone(),
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(pump.run(stream));
        Ok(PodWatch::new(rx, cancel))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => match ClusterError::from(e) {
                e if e.is_not_found() => Ok(()),
                e => Err(e),
            },
        }
    }
}

type RawWatch = BoxStream<'static, kube::Result<WatchEvent<Pod>>>;

/// Issues one watch request starting after a resource version.
#[async_trait]
trait WatchSource: Send + Sync + 'static {
    async fn watch_from(&self, resource_version: &str) -> kube::Result<RawWatch>;
}

struct ApiWatchSource {
    api: Api<Pod>,
    params: WatchParams,
}

#[async_trait]
impl WatchSource for ApiWatchSource {
    async fn watch_from(&self, resource_version: &str) -> kube::Result<RawWatch> {
        Ok(self.api.watch(&self.params, resource_version).await?.boxed())
    }
}

/// Background task feeding one [`PodWatch`].
struct WatchPump<S> {
    source: S,
    namespace: String,
    settings: WatchSettings,
    tx: mpsc::Sender<PodEvent>,
    cancel: CancellationToken,
}

/// Why the inner read loop stopped.
enum Drained {
    /// Server ended the request normally
    Expired { delivered: bool },
    /// Connection failed mid-stream
    Failed,
    /// Consumer went away, or a 410 was forwarded
    Done,
}

impl<S: WatchSource> WatchPump<S> {
    async fn run(self, mut stream: RawWatch) {
        let mut resource_version = "0".to_string();
        let mut failures = 0u32;
        // Consecutive requests the server ended without sending anything
        let mut idle = 0u32;

        loop {
            match self.drain(&mut stream, &mut resource_version).await {
                Drained::Done => return,
                Drained::Expired { delivered: true } => {
                    failures = 0;
                    idle = 0;
                }
                Drained::Expired { delivered: false } => {
                    failures = 0;
                    idle += 1;
                }
                Drained::Failed => failures += 1,
            }

            stream = loop {
                let Some(delay) = self.settings.resume_delay(failures, idle) else {
                    tracing::warn!(namespace = %self.namespace, failures, "giving up on pod watch");
                    return;
                };
                if !delay.is_zero() {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                let attempt = tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    attempt = self.source.watch_from(&resource_version) => attempt,
                };
                match attempt {
                    Ok(s) => break s,
                    Err(e) => {
                        let e = ClusterError::from(e);
                        if e.is_gone() {
                            let status = WatchStatus::new(HTTP_GONE, "Expired", e.to_string());
                            let _ = self.tx.send(PodEvent::Error(status)).await;
                            return;
                        }
                        failures += 1;
                        tracing::warn!(
                            namespace = %self.namespace,
                            error = %e,
                            attempt = failures,
                            "pod watch reconnect failed"
                        );
                    }
                }
            };
            tracing::debug!(namespace = %self.namespace, %resource_version, "resumed pod watch");
        }
    }

    async fn drain(&self, stream: &mut RawWatch, resource_version: &mut String) -> Drained {
        let mut delivered = false;
        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return Drained::Done,
                item = stream.next() => item,
            };
            let event = match item {
                None => return Drained::Expired { delivered },
                Some(Err(e)) => {
                    tracing::warn!(namespace = %self.namespace, error = %e, "pod watch connection failed");
                    return Drained::Failed;
                }
                Some(Ok(raw)) => convert(raw),
            };
            if let Some(rv) = event.resource_version() {
                *resource_version = rv.to_string();
            }
            let gone = matches!(&event, PodEvent::Error(status) if status.is_gone());
            if self.tx.send(event).await.is_err() || gone {
                return Drained::Done;
            }
            delivered = true;
        }
    }
}

fn convert(raw: WatchEvent<Pod>) -> PodEvent {
    match raw {
        WatchEvent::Added(pod) => PodEvent::Added(pod),
        WatchEvent::Modified(pod) => PodEvent::Modified(pod),
        WatchEvent::Deleted(pod) => PodEvent::Deleted(pod),
        WatchEvent::Bookmark(bookmark) => {
            PodEvent::Bookmark { resource_version: bookmark.metadata.resource_version }
        }
        WatchEvent::Error(resp) => PodEvent::Error(WatchStatus::new(resp.code, resp.reason, resp.message)),
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod tests;
