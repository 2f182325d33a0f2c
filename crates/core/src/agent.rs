// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build agent records backed by Kubernetes pods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace and name of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The pod template an agent was provisioned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplateRef {
    pub name: String,
    /// Overrides the global image pull back-off threshold for this template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_backoff_limit: Option<u32>,
}

impl PodTemplateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), image_pull_backoff_limit: None }
    }
}

/// Jenkins-side record of a build agent running in a pod.
///
/// At most one record claims a given pod at a time; the registry enforces
/// this on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Node name, unique within the registry
    pub name: String,
    /// Name of the owning cloud
    pub cloud: String,
    /// Pod backing this agent
    pub pod: PodRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateRef>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>, cloud: impl Into<String>, pod: PodRef) -> Self {
        Self { name: name.into(), cloud: cloud.into(), pod, template: None }
    }

    pub fn with_template(mut self, template: PodTemplateRef) -> Self {
        self.template = Some(template);
        self
    }
}

/// Agent records with test defaults: `node-1` on cloud `k8s`, pod `default/node-1`.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct AgentRecordBuilder {
    record: AgentRecord,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for AgentRecordBuilder {
    fn default() -> Self {
        Self { record: AgentRecord::new("node-1", "k8s", PodRef::new("default", "node-1")) }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AgentRecordBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.record.name = name.into();
        self
    }

    pub fn cloud(mut self, cloud: impl Into<String>) -> Self {
        self.record.cloud = cloud.into();
        self
    }

    pub fn pod(mut self, pod: PodRef) -> Self {
        self.record.pod = pod;
        self
    }

    pub fn template(mut self, template: PodTemplateRef) -> Self {
        self.record.template = Some(template);
        self
    }

    pub fn build(self) -> AgentRecord {
        self.record
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AgentRecord {
    pub fn builder() -> AgentRecordBuilder {
        AgentRecordBuilder::default()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
