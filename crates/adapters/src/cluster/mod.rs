// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes cluster access.
//!
//! The reaper only needs four calls against a cluster: watch the pods of a
//! namespace, get one pod, list pods and delete a pod. [`ClusterClient`]
//! captures exactly that; [`ClusterConnector`] turns a configured [`Cloud`]
//! into a client.
//!
//! # Module layout
//!
//! - `kubernetes`: kube-rs implementation with transparent watch resumption
//! - `fake`: scripted in-memory cluster for tests

mod kubernetes;

pub use kubernetes::{KubeConnector, WatchSettings};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ClusterCall, FakeCluster, FakeConnector};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use reaper_core::{Cloud, PodEvent, HTTP_GONE};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from cluster operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("cannot connect to cluster: {0}")]
    Connect(String),
    #[error("API server returned {code}: {message}")]
    Api { code: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    /// HTTP status code, when the API server answered.
    pub fn code(&self) -> Option<u16> {
        match self {
            ClusterError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        self.code() == Some(HTTP_GONE)
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }
}

/// An open pod watch.
///
/// Events arrive in order on a background task owned by the client. The
/// stream ends (`next` returns `None`) when the transport gives up; dropping
/// or closing the watch releases the underlying connection.
pub struct PodWatch {
    events: mpsc::Receiver<PodEvent>,
    cancel: CancellationToken,
}

impl PodWatch {
    pub fn new(events: mpsc::Receiver<PodEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the transport has closed.
    pub async fn next(&mut self) -> Option<PodEvent> {
        self.events.recv().await
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        self.events.close();
    }
}

impl Drop for PodWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pod operations against one cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Open a watch on all pods in `namespace`.
    ///
    /// Returns an error only when the watch cannot be established at all.
    /// Once open, transient transport failures are retried by the client;
    /// `Error` events from the API server are forwarded unchanged.
    async fn watch(&self, namespace: &str) -> Result<PodWatch, ClusterError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError>;

    /// Delete a pod; deleting a pod that does not exist succeeds.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Builds clients from cloud configuration.
#[async_trait]
pub trait ClusterConnector: Send + Sync + 'static {
    async fn connect(&self, cloud: &Cloud) -> Result<Arc<dyn ClusterClient>, ClusterError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
