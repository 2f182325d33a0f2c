// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-cloud pod watcher.
//!
//! ```text
//! Closed → Opening → Open → Closing → Closed     (close request, 410 resync)
//!                         ↘ Faulted → Closed     (transport gave up)
//! ```
//!
//! A watcher runs as its own task and reports every transition to the
//! coordinator, which owns the registration. Error events other than 410
//! leave the watcher Open; the transport retries underneath. A 410 closes
//! the watch and reopens a fresh one in the same task. A watch that cannot
//! be opened at all ends the task in Closed; the next trigger retries.

use crate::events::{EventProcessor, Flow};
use reaper_adapters::{ClusterConnector, ClusterError, PodWatch};
use reaper_core::{Cloud, PodEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of one cloud's watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchState {
    Closed,
    Opening,
    Open,
    Closing,
    Faulted,
}

reaper_core::simple_display! {
    WatchState {
        Closed => "closed",
        Opening => "opening",
        Open => "open",
        Closing => "closing",
        Faulted => "faulted",
    }
}

/// Progress report from a watcher task to its coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Report {
    pub cloud: String,
    pub generation: u64,
    pub update: Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Update {
    State(WatchState),
    /// The task has finished; the watcher will not reopen
    Exited,
}

/// Coordinator-side handle to a running watcher.
pub(crate) struct WatcherHandle {
    pub cloud: Cloud,
    pub generation: u64,
    pub state: WatchState,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Ask the watcher to close without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Close the watcher and wait until its task has ended.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(cloud = %self.cloud, error = %e, "watcher task failed");
        }
    }
}

enum Exit {
    Stop,
    Resync,
}

enum Step {
    Cancelled,
    Event(Option<PodEvent>),
}

pub(crate) struct CloudPodWatcher {
    cloud: Cloud,
    generation: u64,
    state: WatchState,
    connector: Arc<dyn ClusterConnector>,
    processor: Arc<EventProcessor>,
    reports: mpsc::UnboundedSender<Report>,
    cancel: CancellationToken,
}

impl CloudPodWatcher {
    pub(crate) fn spawn(
        cloud: Cloud,
        generation: u64,
        connector: Arc<dyn ClusterConnector>,
        processor: Arc<EventProcessor>,
        reports: mpsc::UnboundedSender<Report>,
    ) -> WatcherHandle {
        let cancel = CancellationToken::new();
        let watcher = Self {
            cloud: cloud.clone(),
            generation,
            state: WatchState::Closed,
            connector,
            processor,
            reports,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(watcher.run());
        WatcherHandle { cloud, generation, state: WatchState::Closed, cancel, task }
    }

    async fn run(mut self) {
        while let Exit::Resync = self.watch_once().await {
            tracing::info!(cloud = %self.cloud, "reopening pod watch after resync");
        }
        self.report(Update::Exited);
    }

    async fn watch_once(&mut self) -> Exit {
        self.transition(WatchState::Opening);
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = self.open() => Some(result),
        };
        let mut watch = match opened {
            None => {
                self.transition(WatchState::Closed);
                return Exit::Stop;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    cloud = %self.cloud,
                    namespace = %self.cloud.pod_namespace(),
                    error = %e,
                    "cannot open pod watch, staying closed until next trigger"
                );
                self.transition(WatchState::Closed);
                return Exit::Stop;
            }
            Some(Ok(watch)) => watch,
        };
        self.transition(WatchState::Open);
        tracing::info!(cloud = %self.cloud, namespace = %self.cloud.pod_namespace(), "watching pods");

        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                event = watch.next() => Step::Event(event),
            };
            match step {
                Step::Cancelled => {
                    self.close(&mut watch);
                    tracing::info!(cloud = %self.cloud, "closed pod watch");
                    return Exit::Stop;
                }
                Step::Event(None) => {
                    tracing::warn!(cloud = %self.cloud, "pod watch closed by transport");
                    self.transition(WatchState::Faulted);
                    drop(watch);
                    self.transition(WatchState::Closed);
                    return Exit::Stop;
                }
                Step::Event(Some(event)) => {
                    if self.processor.process(&self.cloud, event) == Flow::Resync {
                        self.close(&mut watch);
                        return Exit::Resync;
                    }
                }
            }
        }
    }

    async fn open(&self) -> Result<PodWatch, ClusterError> {
        let client = self.connector.connect(&self.cloud).await?;
        client.watch(self.cloud.pod_namespace()).await
    }

    fn close(&mut self, watch: &mut PodWatch) {
        self.transition(WatchState::Closing);
        watch.close();
        self.transition(WatchState::Closed);
    }

    fn transition(&mut self, next: WatchState) {
        tracing::debug!(cloud = %self.cloud, from = %self.state, to = %next, "watch state");
        self.state = next;
        self.report(Update::State(next));
    }

    fn report(&self, update: Update) {
        // The coordinator has stopped; nobody is left to tell
        let _ = self.reports.send(Report {
            cloud: self.cloud.name().to_string(),
            generation: self.generation,
            update,
        });
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
