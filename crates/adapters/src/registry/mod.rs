// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: the authoritative list of build agents and their computers.
//!
//! The reaper never keeps its own copy of this list. Every correlation goes
//! through [`AgentRegistry::all_agents`], and every mutation through the
//! registry's own calls.

use indexmap::IndexMap;
use parking_lot::Mutex;
use reaper_core::{AgentRecord, OfflineCause};
use std::sync::Arc;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent not found: {0}")]
    NotFound(String),
    #[error("pod {pod} already belongs to agent {owner}")]
    DuplicatePod { pod: String, owner: String },
}

/// The node list of the build controller.
pub trait AgentRegistry: Send + Sync + 'static {
    /// Add an agent, replacing any agent with the same name.
    fn add_agent(&self, agent: AgentRecord) -> Result<(), RegistryError>;

    fn remove_agent(&self, name: &str) -> Option<AgentRecord>;

    fn all_agents(&self) -> Vec<AgentRecord>;

    fn get_agent(&self, name: &str) -> Option<AgentRecord>;

    /// Take the agent's computer offline with `cause`.
    fn disconnect(&self, name: &str, cause: OfflineCause) -> Result<(), RegistryError>;

    /// Run the agent's own termination routine. Idempotent.
    fn terminate(&self, name: &str) -> Result<(), RegistryError>;
}

/// Called once per agent when its termination routine runs.
pub trait TerminateHook: Send + Sync + 'static {
    fn on_terminate(&self, agent: &AgentRecord);
}

/// Live state of an agent's computer (execution channel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputerState {
    pub online: bool,
    pub offline_cause: Option<OfflineCause>,
    pub terminated: bool,
    pub disconnects: u32,
}

struct Node {
    record: AgentRecord,
    computer: ComputerState,
}

/// In-process node list.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: Arc<Mutex<IndexMap<String, Node>>>,
    hook: Option<Arc<dyn TerminateHook>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terminate_hook(mut self, hook: Arc<dyn TerminateHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn computer(&self, name: &str) -> Option<ComputerState> {
        self.nodes.lock().get(name).map(|n| n.computer.clone())
    }

    /// Mark the agent's computer online, as when its launcher connects.
    pub fn set_online(&self, name: &str) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        node.computer.online = true;
        node.computer.offline_cause = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

impl AgentRegistry for NodeRegistry {
    fn add_agent(&self, agent: AgentRecord) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.lock();
        if let Some(owner) =
            nodes.values().find(|n| n.record.pod == agent.pod && n.record.name != agent.name)
        {
            return Err(RegistryError::DuplicatePod {
                pod: agent.pod.to_string(),
                owner: owner.record.name.clone(),
            });
        }
        tracing::debug!(agent = %agent.name, pod = %agent.pod, "adding agent");
        nodes.insert(agent.name.clone(), Node { record: agent, computer: ComputerState::default() });
        Ok(())
    }

    fn remove_agent(&self, name: &str) -> Option<AgentRecord> {
        self.nodes.lock().shift_remove(name).map(|n| n.record)
    }

    fn all_agents(&self) -> Vec<AgentRecord> {
        self.nodes.lock().values().map(|n| n.record.clone()).collect()
    }

    fn get_agent(&self, name: &str) -> Option<AgentRecord> {
        self.nodes.lock().get(name).map(|n| n.record.clone())
    }

    fn disconnect(&self, name: &str, cause: OfflineCause) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        tracing::info!(agent = %name, %cause, "disconnecting agent");
        node.computer.online = false;
        node.computer.disconnects += 1;
        node.computer.offline_cause = Some(cause);
        Ok(())
    }

    fn terminate(&self, name: &str) -> Result<(), RegistryError> {
        let record = {
            let mut nodes = self.nodes.lock();
            let node =
                nodes.get_mut(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            if node.computer.terminated {
                return Ok(());
            }
            node.computer.terminated = true;
            node.computer.online = false;
            node.record.clone()
        };
        tracing::info!(agent = %name, "terminating agent");
        if let Some(hook) = &self.hook {
            hook.on_terminate(&record);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
