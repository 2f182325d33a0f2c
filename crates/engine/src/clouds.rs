// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configured clouds, with change notifications.
//!
//! The store is keyed by cloud name. Replacing a cloud under the same name
//! yields [`CloudChange::Updated`] carrying both instances, which is how the
//! coordinator notices that a watcher is bound to a stale configuration.

use indexmap::IndexMap;
use parking_lot::RwLock;
use reaper_core::Cloud;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANGE_BUFFER: usize = 64;

/// A mutation of the cloud list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudChange {
    Added(Cloud),
    Removed(Cloud),
    Updated { old: Cloud, new: Cloud },
}

impl CloudChange {
    pub fn name(&self) -> &str {
        match self {
            CloudChange::Added(cloud) | CloudChange::Removed(cloud) => cloud.name(),
            CloudChange::Updated { new, .. } => new.name(),
        }
    }
}

/// Shared, enumerable list of configured clouds.
#[derive(Clone)]
pub struct CloudStore {
    clouds: Arc<RwLock<IndexMap<String, Cloud>>>,
    changes: broadcast::Sender<CloudChange>,
}

impl Default for CloudStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { clouds: Arc::new(RwLock::new(IndexMap::new())), changes }
    }

    /// A store preloaded with `clouds`, without emitting notifications.
    pub fn with_clouds(clouds: impl IntoIterator<Item = Cloud>) -> Self {
        let store = Self::new();
        store.clouds.write().extend(clouds.into_iter().map(|c| (c.name().to_string(), c)));
        store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CloudChange> {
        self.changes.subscribe()
    }

    pub fn get(&self, name: &str) -> Option<Cloud> {
        self.clouds.read().get(name).cloned()
    }

    pub fn all(&self) -> Vec<Cloud> {
        self.clouds.read().values().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clouds.read().contains_key(name)
    }

    /// Add or replace a cloud. Re-inserting the same instance is a no-op.
    pub fn upsert(&self, cloud: Cloud) -> Option<CloudChange> {
        let mut clouds = self.clouds.write();
        let change = match clouds.insert(cloud.name().to_string(), cloud.clone()) {
            Some(old) if old.is_same_instance(&cloud) => return None,
            Some(old) => CloudChange::Updated { old, new: cloud },
            None => CloudChange::Added(cloud),
        };
        self.publish(&change);
        Some(change)
    }

    pub fn remove(&self, name: &str) -> Option<CloudChange> {
        let mut clouds = self.clouds.write();
        let change = CloudChange::Removed(clouds.shift_remove(name)?);
        self.publish(&change);
        Some(change)
    }

    /// Replace the whole list, as on a configuration reload.
    ///
    /// A cloud whose connection and retention are unchanged keeps its
    /// existing instance, so its watcher is left alone.
    pub fn replace_all(&self, clouds: Vec<Cloud>) -> Vec<CloudChange> {
        let gone: Vec<String> = {
            let current = self.clouds.read();
            current
                .keys()
                .filter(|name| !clouds.iter().any(|c| c.name() == name.as_str()))
                .cloned()
                .collect()
        };
        let mut changes: Vec<_> = gone.iter().filter_map(|name| self.remove(name)).collect();
        for cloud in clouds {
            let unchanged = self.get(cloud.name()).is_some_and(|old| {
                old.same_connection(&cloud) && old.pod_retention == cloud.pod_retention
            });
            if !unchanged {
                changes.extend(self.upsert(cloud));
            }
        }
        changes
    }

    fn publish(&self, change: &CloudChange) {
        tracing::debug!(cloud = %change.name(), ?change, "cloud list changed");
        // No receivers just means nothing is watching yet
        let _ = self.changes.send(change.clone());
    }
}

#[cfg(test)]
#[path = "clouds_tests.rs"]
mod tests;
