// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reaper coordinator.
//!
//! A single task owns the map of cloud watchers. Everything that wants to
//! open, replace or close a watcher sends it a [`Command`]; watcher tasks
//! report their state transitions back over a second channel, and cloud
//! list changes arrive from the [`CloudStore`]. [`Reaper`] is the cheap,
//! cloneable handle to that task.

use crate::activation;
use crate::clouds::{CloudChange, CloudStore};
use crate::config::ReaperConfig;
use crate::error::ReaperError;
use crate::events::EventProcessor;
use crate::listener::{Listeners, PodEventListener};
use crate::policy::{default_policies, TerminationPolicy};
use crate::reasons::TerminationReasons;
use crate::watcher::{CloudPodWatcher, Report, Update, WatchState, WatcherHandle};
use indexmap::IndexMap;
use reaper_adapters::{AgentRegistry, ClusterConnector};
use reaper_core::{AgentRecord, Clock, SystemClock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

static INSTANCE: OnceLock<Reaper> = OnceLock::new();

enum Command {
    /// Open a watcher for every configured cloud and follow cloud changes
    Activate,
    /// Make sure the current instance of a cloud is being watched
    Watch { cloud: String },
    WatchState { cloud: String, reply: oneshot::Sender<Option<WatchState>> },
    WatchedClouds { reply: oneshot::Sender<Vec<String>> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to the reaper coordinator.
#[derive(Clone)]
pub struct Reaper {
    inner: Arc<Shared>,
}

struct Shared {
    commands: mpsc::UnboundedSender<Command>,
    activated: AtomicBool,
    registry: Arc<dyn AgentRegistry>,
    connector: Arc<dyn ClusterConnector>,
    store: CloudStore,
    reasons: Arc<TerminationReasons>,
}

impl Reaper {
    pub fn builder(
        connector: Arc<dyn ClusterConnector>,
        registry: Arc<dyn AgentRegistry>,
        store: CloudStore,
    ) -> ReaperBuilder {
        ReaperBuilder::new(connector, registry, store)
    }

    /// Make this the process-wide instance.
    pub fn install(self) -> Result<&'static Reaper, ReaperError> {
        INSTANCE.set(self).map_err(|_| ReaperError::AlreadyInstalled)?;
        INSTANCE.get().ok_or(ReaperError::AlreadyInstalled)
    }

    /// The process-wide instance, once installed.
    pub fn get_instance() -> Option<&'static Reaper> {
        INSTANCE.get()
    }

    /// Activate on first call: reconcile existing agents against their pods,
    /// then start watching every configured cloud.
    ///
    /// Only the first caller does the work and gets `Ok(true)`; every other
    /// caller returns `Ok(false)` at once.
    pub async fn maybe_activate(&self) -> Result<bool, ReaperError> {
        if self.inner.commands.is_closed() {
            return Err(ReaperError::Stopped);
        }
        if self
            .inner
            .activated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        tracing::info!("activating reaper");
        activation::reconcile_agents(
            self.inner.registry.as_ref(),
            self.inner.connector.as_ref(),
            &self.inner.store,
        )
        .await;
        self.send(Command::Activate)?;
        Ok(true)
    }

    pub fn is_activated(&self) -> bool {
        self.inner.activated.load(Ordering::Acquire)
    }

    /// Called as an agent is about to come online.
    ///
    /// Activates the reaper if needed and makes sure the agent's cloud is
    /// watched, which covers clouds added since activation.
    pub async fn pre_launch(&self, agent: &AgentRecord) -> Result<(), ReaperError> {
        self.maybe_activate().await?;
        tracing::debug!(agent = %agent.name, cloud = %agent.cloud, "agent launching");
        self.send(Command::Watch { cloud: agent.cloud.clone() })
    }

    /// Whether `cloud` has an Open watcher. Follows watcher closure
    /// asynchronously, so assert on it with a wait, not once.
    pub async fn is_watching_cloud(&self, cloud: &str) -> bool {
        self.watch_state(cloud).await == Some(WatchState::Open)
    }

    /// State of the watcher registered for `cloud`, if there is one.
    pub async fn watch_state(&self, cloud: &str) -> Option<WatchState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::WatchState { cloud: cloud.to_string(), reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// Names of clouds with an Open watcher.
    pub async fn watched_clouds(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::WatchedClouds { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Termination reasons recently recorded for an agent, including agents
    /// that have since been removed.
    pub fn termination_reasons(&self, agent: &str) -> BTreeSet<String> {
        self.inner.reasons.get(agent)
    }

    /// Close every watcher and stop the coordinator. Returns once all
    /// watcher tasks have ended. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), ReaperError> {
        self.inner.commands.send(command).map_err(|_| ReaperError::Stopped)
    }
}

/// Wires a [`Reaper`] to its collaborators.
pub struct ReaperBuilder<C: Clock = SystemClock> {
    connector: Arc<dyn ClusterConnector>,
    registry: Arc<dyn AgentRegistry>,
    store: CloudStore,
    config: ReaperConfig,
    clock: C,
    listeners: Vec<Arc<dyn PodEventListener>>,
    policies: Vec<Arc<dyn TerminationPolicy>>,
}

impl ReaperBuilder<SystemClock> {
    pub fn new(
        connector: Arc<dyn ClusterConnector>,
        registry: Arc<dyn AgentRegistry>,
        store: CloudStore,
    ) -> Self {
        Self {
            connector,
            registry,
            store,
            config: ReaperConfig::default(),
            clock: SystemClock,
            listeners: Vec::new(),
            policies: Vec::new(),
        }
    }
}

impl<C: Clock> ReaperBuilder<C> {
    pub fn config(mut self, config: ReaperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock<C2: Clock>(self, clock: C2) -> ReaperBuilder<C2> {
        ReaperBuilder {
            connector: self.connector,
            registry: self.registry,
            store: self.store,
            config: self.config,
            clock,
            listeners: self.listeners,
            policies: self.policies,
        }
    }

    pub fn listener(mut self, listener: Arc<dyn PodEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Add a policy on top of the built-in ones.
    pub fn policy(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Spawn the coordinator task. Must be called within a tokio runtime.
    pub fn start(self) -> Reaper {
        let mut policies = default_policies(&self.config, self.clock.clone());
        policies.extend(self.policies);
        let reasons = Arc::new(TerminationReasons::new(self.clock, self.config.reasons_ttl));
        let processor = Arc::new(EventProcessor {
            registry: Arc::clone(&self.registry),
            policies,
            listeners: Listeners::new(self.listeners),
            reasons: Arc::clone(&reasons),
        });

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            store: self.store.clone(),
            connector: Arc::clone(&self.connector),
            processor,
            watchers: IndexMap::new(),
            generation: 0,
            active: false,
            reports: reports_tx,
        };
        let changes = self.store.subscribe();
        tokio::spawn(coordinator.run(commands_rx, reports_rx, changes));

        Reaper {
            inner: Arc::new(Shared {
                commands: commands_tx,
                activated: AtomicBool::new(false),
                registry: self.registry,
                connector: self.connector,
                store: self.store,
                reasons,
            }),
        }
    }
}

/// The task owning the watcher map.
struct Coordinator {
    store: CloudStore,
    connector: Arc<dyn ClusterConnector>,
    processor: Arc<EventProcessor>,
    watchers: IndexMap<String, WatcherHandle>,
    generation: u64,
    /// Set once activated; cloud additions are ignored before that
    active: bool,
    reports: mpsc::UnboundedSender<Report>,
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<Report>,
        mut changes: broadcast::Receiver<CloudChange>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                Some(report) = reports.recv() => self.on_report(report),
                change = changes.recv() => self.on_change(change).await,
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Activate => {
                self.active = true;
                for cloud in self.store.all() {
                    self.watch(cloud.name()).await;
                }
            }
            Command::Watch { cloud } => self.watch(&cloud).await,
            Command::WatchState { cloud, reply } => {
                let _ = reply.send(self.watchers.get(&cloud).map(|w| w.state));
            }
            Command::WatchedClouds { reply } => {
                let names = self
                    .watchers
                    .iter()
                    .filter(|(_, w)| w.state == WatchState::Open)
                    .map(|(name, _)| name.clone())
                    .collect();
                let _ = reply.send(names);
            }
            // Handled by the run loop
            Command::Shutdown { .. } => {}
        }
    }

    /// Watch the current instance of `name`, replacing a watcher bound to a
    /// stale instance. The old watcher is fully closed before the new one
    /// starts, so events are never delivered twice.
    async fn watch(&mut self, name: &str) {
        let Some(cloud) = self.store.get(name) else {
            tracing::debug!(cloud = %name, "cloud not configured, nothing to watch");
            return;
        };
        if let Some(existing) = self.watchers.get(name) {
            if existing.cloud.is_same_instance(&cloud) {
                return;
            }
            tracing::warn!(
                cloud = %name,
                stale = %existing.cloud.instance(),
                current = %cloud.instance(),
                "watcher bound to a stale cloud instance, replacing"
            );
            self.unwatch(name).await;
        }

        self.generation += 1;
        tracing::info!(cloud = %cloud, generation = self.generation, "starting pod watcher");
        let handle = CloudPodWatcher::spawn(
            cloud,
            self.generation,
            Arc::clone(&self.connector),
            Arc::clone(&self.processor),
            self.reports.clone(),
        );
        self.watchers.insert(name.to_string(), handle);
    }

    async fn unwatch(&mut self, name: &str) {
        if let Some(watcher) = self.watchers.shift_remove(name) {
            tracing::info!(cloud = %watcher.cloud, "stopping pod watcher");
            watcher.close().await;
        }
    }

    fn on_report(&mut self, report: Report) {
        let Some(watcher) = self.watchers.get_mut(&report.cloud) else { return };
        if watcher.generation != report.generation {
            return;
        }
        match report.update {
            Update::State(state) => watcher.state = state,
            Update::Exited => {
                tracing::debug!(cloud = %report.cloud, "pod watcher exited, deregistering");
                self.watchers.shift_remove(&report.cloud);
            }
        }
    }

    async fn on_change(&mut self, change: Result<CloudChange, RecvError>) {
        match change {
            Ok(CloudChange::Added(cloud)) => {
                if self.active {
                    self.watch(cloud.name()).await;
                }
            }
            Ok(CloudChange::Updated { new, .. }) => {
                if self.active || self.watchers.contains_key(new.name()) {
                    self.watch(new.name()).await;
                }
            }
            Ok(CloudChange::Removed(cloud)) => self.unwatch(cloud.name()).await,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "missed cloud changes, resyncing watchers");
                self.resync().await;
            }
            // The coordinator's own store keeps the sender alive
            Err(RecvError::Closed) => {}
        }
    }

    /// Bring the watcher map in line with the full cloud list.
    async fn resync(&mut self) {
        let gone: Vec<String> =
            self.watchers.keys().filter(|name| !self.store.contains(name)).cloned().collect();
        for name in gone {
            self.unwatch(&name).await;
        }
        let names: Vec<String> = if self.active {
            self.store.all().iter().map(|c| c.name().to_string()).collect()
        } else {
            self.watchers.keys().cloned().collect()
        };
        for name in names {
            self.watch(&name).await;
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!(watchers = self.watchers.len(), "shutting down reaper");
        for watcher in self.watchers.values() {
            watcher.cancel();
        }
        for (_, watcher) in self.watchers.drain(..) {
            watcher.close().await;
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
