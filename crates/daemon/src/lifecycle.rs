// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: wiring, config reload and shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reaper_adapters::{AgentRegistry, ClusterConnector, KubeConnector, NodeRegistry, RegistryError};
use reaper_engine::{CloudChange, CloudStore, Reaper, ReaperError, RetentionHook};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::AuditListener;
use crate::config::{ConfigError, Settings};

/// Errors that stop the daemon from starting
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine config path: set REAPER_CONFIG or HOME")]
    NoConfigDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("reaper error: {0}")]
    Reaper(#[from] ReaperError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a config reload changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
    pub new_agents: Vec<String>,
}

/// A running reaper with its collaborators.
pub struct Daemon {
    pub registry: NodeRegistry,
    pub store: CloudStore,
    pub reaper: Reaper,
}

impl Daemon {
    /// Wire the registry, cloud store and coordinator. Does not activate.
    pub fn new(settings: Settings, connector: Arc<dyn ClusterConnector>) -> Result<Self, LifecycleError> {
        let Settings { engine, clouds, agents, .. } = settings;
        let store = CloudStore::with_clouds(clouds);
        let hook = RetentionHook::new(store.clone(), Arc::clone(&connector));
        let registry = NodeRegistry::new().with_terminate_hook(Arc::new(hook));
        for agent in agents {
            registry.add_agent(agent)?;
        }
        let reaper = Reaper::builder(connector, Arc::new(registry.clone()), store.clone())
            .config(engine)
            .listener(Arc::new(AuditListener))
            .start();
        Ok(Self { registry, store, reaper })
    }

    /// Apply a reloaded config: replace the cloud list and launch agents not
    /// yet registered. Engine tunables only take effect on restart.
    pub async fn reload(&self, settings: Settings) -> Result<ReloadSummary, LifecycleError> {
        let mut summary = ReloadSummary::default();
        for change in self.store.replace_all(settings.clouds) {
            let name = change.name().to_string();
            match change {
                CloudChange::Added(_) => summary.added.push(name),
                CloudChange::Removed(_) => summary.removed.push(name),
                CloudChange::Updated { .. } => summary.updated.push(name),
            }
        }
        for agent in settings.agents {
            if self.registry.get_agent(&agent.name).is_some() {
                continue;
            }
            if let Err(e) = self.registry.add_agent(agent.clone()) {
                warn!(agent = %agent.name, error = %e, "skipping agent from reloaded config");
                continue;
            }
            self.reaper.pre_launch(&agent).await?;
            summary.new_agents.push(agent.name);
        }
        info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            updated = summary.updated.len(),
            new_agents = summary.new_agents.len(),
            "config reloaded"
        );
        Ok(summary)
    }

    /// Announce every configured agent to the reaper. With no agents the
    /// reaper stays inactive and no cluster is contacted.
    pub async fn launch_agents(&self) -> Result<usize, LifecycleError> {
        let mut launched = 0;
        for agent in self.registry.all_agents() {
            // activation drops agents whose pods are gone
            if self.registry.get_agent(&agent.name).is_none() {
                continue;
            }
            self.reaper.pre_launch(&agent).await?;
            launched += 1;
        }
        Ok(launched)
    }

    /// Stop every watcher, giving up after `drain`.
    pub async fn shutdown(&self, drain: Duration) {
        if tokio::time::timeout(drain, self.reaper.shutdown()).await.is_err() {
            warn!(timeout_ms = drain.as_millis() as u64, "watchers did not close in time");
        }
    }
}

/// Load the config at `path`, start the reaper against real clusters and
/// launch the configured agents.
pub async fn startup(path: &Path) -> Result<Daemon, LifecycleError> {
    let settings = Settings::load(path)?;
    info!(config = %path.display(), "{}", crate::config::summary(&settings));
    let connector = Arc::new(KubeConnector::new(settings.watch.clone()));
    let daemon = Daemon::new(settings, connector)?;
    daemon.reaper.clone().install()?;
    if daemon.launch_agents().await? == 0 {
        info!("no agents configured, reaper stays inactive");
    }
    Ok(daemon)
}

/// Re-read the config file. Errors leave the running config in place.
pub async fn reload(daemon: &Daemon, path: &Path) {
    match Settings::load(path) {
        Ok(settings) => {
            if let Err(e) = daemon.reload(settings).await {
                warn!(error = %e, "config reload failed");
            }
        }
        Err(e) => warn!(error = %e, "ignoring invalid config on reload"),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
